// 导航模块 - 管理四个屏幕之间的返回栈
//
// 屏幕之间只传递少量字符串参数（照片 URI、菜谱文本），
// 对外的路由字符串使用百分号编码，缺失的参数显式表示为 None

pub mod route;

use serde::Serialize;
use tracing::debug;

use crate::error::FlowError;
pub use route::{decode_param, encode_param};

/// 屏幕
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// 主菜单
    Main,
    /// 拍照
    Camera,
    /// 照片预览与上传
    Preview {
        #[serde(rename = "photoUri")]
        photo_uri: String,
    },
    /// 菜谱展示
    Recipe {
        recipe: Option<String>,
        #[serde(rename = "photoUri")]
        photo_uri: Option<String>,
    },
}

impl Screen {
    /// 路由名（不含参数）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Camera => "camera",
            Self::Preview { .. } => "preview",
            Self::Recipe { .. } => "recipe",
        }
    }

    /// 生成路由字符串
    ///
    /// - `main`
    /// - `camera`
    /// - `preview/<encoded-photoUri>`
    /// - `recipe?recipe=<encoded>&photoUri=<encoded>`（缺失的参数不出现）
    pub fn route(&self) -> String {
        match self {
            Self::Main => "main".to_string(),
            Self::Camera => "camera".to_string(),
            Self::Preview { photo_uri } => format!("preview/{}", encode_param(photo_uri)),
            Self::Recipe { recipe, photo_uri } => {
                let mut params = Vec::new();
                if let Some(recipe) = recipe {
                    params.push(format!("recipe={}", encode_param(recipe)));
                }
                if let Some(uri) = photo_uri {
                    params.push(format!("photoUri={}", encode_param(uri)));
                }
                if params.is_empty() {
                    "recipe".to_string()
                } else {
                    format!("recipe?{}", params.join("&"))
                }
            }
        }
    }

    /// 解析路由字符串
    pub fn parse_route(route: &str) -> Result<Self, FlowError> {
        let (path, query) = match route.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (route, None),
        };

        match path {
            "main" if query.is_none() => Ok(Self::Main),
            "camera" if query.is_none() => Ok(Self::Camera),
            "recipe" => {
                let mut recipe = None;
                let mut photo_uri = None;
                for (key, value) in query.map(route::parse_query).unwrap_or_default() {
                    match key {
                        "recipe" => recipe = Some(decode_param(value)),
                        "photoUri" => photo_uri = Some(decode_param(value)),
                        _ => debug!("忽略未知的路由参数: {}", key),
                    }
                }
                Ok(Self::Recipe { recipe, photo_uri })
            }
            _ => match path.strip_prefix("preview/") {
                Some(encoded) if !encoded.is_empty() && query.is_none() => Ok(Self::Preview {
                    photo_uri: decode_param(encoded),
                }),
                _ => Err(FlowError::InvalidRoute(route.to_string())),
            },
        }
    }
}

/// 转场动画
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    /// 默认动画
    Default,
    /// 垂直滑入/滑出（仅用于进入或离开拍照屏幕）
    SlideVertical,
}

/// 一次屏幕切换
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: Screen,
    pub to: Screen,
    pub animation: Animation,
}

impl Transition {
    fn new(from: Screen, to: Screen) -> Self {
        let animation = if from == Screen::Camera || to == Screen::Camera {
            Animation::SlideVertical
        } else {
            Animation::Default
        };
        Self {
            from,
            to,
            animation,
        }
    }
}

/// 导航选项
#[derive(Debug, Clone, Copy, Default)]
pub struct NavOptions {
    /// 导航前先弹出到主菜单（主菜单保留）
    pub pop_up_to_main: bool,
}

/// 导航控制器 - 维护返回栈，栈底永远是主菜单
#[derive(Debug, Clone)]
pub struct NavigationController {
    stack: Vec<Screen>,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationController {
    pub fn new() -> Self {
        Self {
            stack: vec![Screen::Main],
        }
    }

    /// 当前屏幕
    pub fn current(&self) -> &Screen {
        // 栈底的 Main 永远不会被弹出
        &self.stack[self.stack.len() - 1]
    }

    /// 返回栈（从底到顶）
    pub fn stack(&self) -> &[Screen] {
        &self.stack
    }

    /// 跳转到指定屏幕
    pub fn navigate(&mut self, screen: Screen, options: NavOptions) -> Transition {
        let from = self.current().clone();
        if options.pop_up_to_main {
            self.stack.truncate(1);
        }
        if screen == Screen::Main {
            // 主菜单只存在于栈底
            self.stack.truncate(1);
        } else {
            self.stack.push(screen);
        }
        let transition = Transition::new(from, self.current().clone());
        debug!("导航: {} -> {}", transition.from.route(), transition.to.route());
        transition
    }

    /// 返回上一屏；已在主菜单时返回 None
    pub fn back(&mut self) -> Option<Transition> {
        if self.stack.len() <= 1 {
            return None;
        }
        let from = self.stack.pop()?;
        Some(Transition::new(from, self.current().clone()))
    }

    /// 直接返回主菜单
    pub fn pop_to_main(&mut self) -> Transition {
        let from = self.current().clone();
        self.stack.truncate(1);
        Transition::new(from, Screen::Main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(uri: &str) -> Screen {
        Screen::Preview {
            photo_uri: uri.to_string(),
        }
    }

    #[test]
    fn test_route_round_trip() {
        let screens = vec![
            Screen::Main,
            Screen::Camera,
            preview("file:///data/photos/IMG_20240101_120000.jpg"),
            Screen::Recipe {
                recipe: Some("Рецепт: суп & хлеб = обед?".to_string()),
                photo_uri: Some("file:///data/a b%.jpg".to_string()),
            },
            Screen::Recipe {
                recipe: None,
                photo_uri: Some("file:///x.jpg".to_string()),
            },
            Screen::Recipe {
                recipe: Some(String::new()),
                photo_uri: None,
            },
            Screen::Recipe {
                recipe: None,
                photo_uri: None,
            },
        ];

        for screen in screens {
            let route = screen.route();
            assert_eq!(Screen::parse_route(&route).unwrap(), screen, "路由: {}", route);
        }
    }

    #[test]
    fn test_absent_and_empty_recipe_are_distinct() {
        let absent = Screen::parse_route("recipe?photoUri=x").unwrap();
        let empty = Screen::parse_route("recipe?recipe=&photoUri=x").unwrap();
        assert_ne!(absent, empty);
        assert_eq!(
            empty,
            Screen::Recipe {
                recipe: Some(String::new()),
                photo_uri: Some("x".to_string())
            }
        );
    }

    #[test]
    fn test_invalid_routes() {
        for route in ["", "settings", "preview/", "preview", "main?x=1"] {
            assert!(
                matches!(Screen::parse_route(route), Err(FlowError::InvalidRoute(_))),
                "应拒绝路由: {}",
                route
            );
        }
    }

    #[test]
    fn test_camera_transitions_slide_vertically() {
        let mut nav = NavigationController::new();
        let enter = nav.navigate(Screen::Camera, NavOptions::default());
        assert_eq!(enter.animation, Animation::SlideVertical);

        let leave = nav.navigate(preview("file:///p.jpg"), NavOptions::default());
        assert_eq!(leave.animation, Animation::SlideVertical);

        let back = nav.back().unwrap();
        assert_eq!(back.to, Screen::Camera);
        assert_eq!(back.animation, Animation::SlideVertical);

        let mut nav = NavigationController::new();
        nav.navigate(preview("file:///p.jpg"), NavOptions::default());
        let to_recipe = nav.navigate(
            Screen::Recipe {
                recipe: None,
                photo_uri: None,
            },
            NavOptions::default(),
        );
        assert_eq!(to_recipe.animation, Animation::Default);
    }

    #[test]
    fn test_recipe_back_goes_to_main() {
        let mut nav = NavigationController::new();
        nav.navigate(Screen::Camera, NavOptions::default());
        nav.navigate(preview("file:///p.jpg"), NavOptions::default());
        nav.navigate(
            Screen::Recipe {
                recipe: Some("Recipe: Tomato Soup".to_string()),
                photo_uri: Some("file:///p.jpg".to_string()),
            },
            NavOptions {
                pop_up_to_main: true,
            },
        );
        assert_eq!(nav.stack().len(), 2);

        let back = nav.back().unwrap();
        assert_eq!(back.to, Screen::Main);
        assert!(nav.back().is_none());
        assert_eq!(nav.current(), &Screen::Main);
    }

    #[test]
    fn test_navigate_to_main_never_duplicates_root() {
        let mut nav = NavigationController::new();
        nav.navigate(Screen::Camera, NavOptions::default());
        nav.navigate(Screen::Main, NavOptions::default());
        assert_eq!(nav.stack(), &[Screen::Main]);
    }
}
