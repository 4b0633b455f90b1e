// 菜谱展示 - 只读视图

use serde::Serialize;

/// 没有收到菜谱时的占位文本
pub const NO_RECIPE_PLACEHOLDER: &str = "Рецепт не получен";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeView {
    /// 照片 URI，为空时不显示图片
    pub photo_uri: Option<String>,
    /// 要显示的文本（菜谱或占位文本）
    pub text: String,
    pub has_recipe: bool,
}

impl RecipeView {
    pub fn new(recipe: Option<&str>, photo_uri: Option<&str>) -> Self {
        let photo_uri = photo_uri.filter(|uri| !uri.is_empty()).map(str::to_string);
        match recipe.filter(|text| !text.is_empty()) {
            Some(text) => Self {
                photo_uri,
                text: text.to_string(),
                has_recipe: true,
            },
            None => Self {
                photo_uri,
                text: NO_RECIPE_PLACEHOLDER.to_string(),
                has_recipe: false,
            },
        }
    }
}
