fn main() {
    // macOS 首次打开相机时显示的说明
    #[cfg(target_os = "macos")]
    {
        println!("cargo:rustc-env=MACOSX_DEPLOYMENT_TARGET=10.13");
        std::env::set_var(
            "TAURI_BUNDLE_NSCameraUsageDescription",
            "Камера нужна, чтобы сфотографировать блюдо и получить рецепт.",
        );
    }

    tauri_build::build()
}
