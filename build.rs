// 构建脚本: 启用 `camera` 时链接 FFmpeg 静态库的系统依赖
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    if std::env::var_os("CARGO_FEATURE_CAMERA").is_none() {
        return;
    }

    // 仅在Windows MSVC环境下需要
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // 采集 (dshow) 依赖 OLE 与 VFW
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");
        println!("cargo:rustc-link-lib=dylib=strmiids");
        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
