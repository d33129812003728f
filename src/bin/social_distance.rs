//! social-distance - 摄像头社交距离检测服务
//!
//! 1. 启动时加载配置、类别表、模型、字体
//! 2. HTTP 提供 `/stream/video` (multipart MJPEG)
//! 3. 同一时间只服务一个客户端; 客户端断开即释放摄像头
//! 4. Ctrl-C 取消当前视频流并退出

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use social_distance_rs::input::{FrameSource, StillImageSource};
use social_distance_rs::models::{Model, SsdDetector};
use social_distance_rs::pipeline::{
    CancelToken, FrameStream, PipelineContext, MULTIPART_CONTENT_TYPE,
};
use social_distance_rs::sink::SnapshotSink;
use social_distance_rs::{Args, ClassLabelTable, PipelineConfig, Renderer};

const MAX_REQUEST_BYTES: usize = 8 * 1024;
const STILL_IMAGE_INTERVAL: Duration = Duration::from_millis(40);

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>Social Distance</title></head>
<body style="margin:0;background:#111">
<img src="/stream/video" style="display:block;margin:auto;max-width:100%">
</body>
</html>
"#;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    // 配置: 文件 + 命令行覆盖
    let mut config = PipelineConfig::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    config.apply_args(&args);
    config.validate()?;
    config.print_summary();

    // 类别表 + 模型
    let classes = ClassLabelTable::load(args.classes_path())?;
    let model = SsdDetector::new(config.ort_config(&args.model, args.ep()))
        .with_context(|| format!("failed to load model {}", args.model.display()))?;
    model.summary();

    // 字体: --font 覆盖内置字体
    let font = match &config.font_path {
        Some(path) => match Renderer::load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                log::warn!("⚠️ 字体加载失败 {}: {}, 改用内置字体", path.display(), e);
                None
            }
        },
        None => {
            log::info!("🔤 使用内置字体 DejaVu Sans");
            None
        }
    };
    let renderer = Renderer::new(config.render_settings(), font);

    let mut ctx = PipelineContext::new(
        Box::new(model),
        classes,
        config.analysis_settings(args.profile),
        renderer,
    )?;

    let shutdown = CancelToken::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.cancel()).context("error setting Ctrl-C handler")?;
    }

    let listener =
        TcpListener::bind(&args.addr).with_context(|| format!("failed to bind {}", args.addr))?;
    listener.set_nonblocking(true)?;
    log::info!("🌐 视频流地址: http://{}/stream/video", listener.local_addr()?);

    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                log::info!("👤 客户端连接: {}", peer);
                if let Err(err) = handle_connection(stream, &mut ctx, &args, &config, &shutdown) {
                    log::warn!("request from {} failed: {}", peer, err);
                }
                log::info!("👋 客户端断开: {}", peer);
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    log::info!("shutdown signal received, exiting");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Index,
    Health,
    Stream,
    NotFound,
    MethodNotAllowed,
}

fn route(method: &str, path: &str) -> Route {
    if method != "GET" {
        return Route::MethodNotAllowed;
    }
    match path {
        "/" => Route::Index,
        "/health" => Route::Health,
        "/stream/video" => Route::Stream,
        _ => Route::NotFound,
    }
}

fn handle_connection(
    mut stream: TcpStream,
    ctx: &mut PipelineContext,
    args: &Args,
    config: &PipelineConfig,
    shutdown: &CancelToken,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let (method, path) = read_request(&mut stream)?;

    match route(&method, &path) {
        Route::Index => {
            write_response(&mut stream, 200, "text/html; charset=utf-8", INDEX_HTML.as_bytes())
        }
        Route::Health => write_response(&mut stream, 200, "text/plain", b"ok"),
        Route::NotFound => write_response(&mut stream, 404, "text/plain", b"not found"),
        Route::MethodNotAllowed => {
            write_response(&mut stream, 405, "text/plain", b"method not allowed")
        }
        Route::Stream => {
            let source = match open_source(args, config) {
                Ok(source) => source,
                Err(e) => {
                    write_response(&mut stream, 503, "text/plain", e.to_string().as_bytes())?;
                    return Err(e.into());
                }
            };
            serve_stream(stream, ctx, source, args, config, shutdown)
        }
    }
}

fn serve_stream(
    mut stream: TcpStream,
    ctx: &mut PipelineContext,
    source: Box<dyn FrameSource>,
    args: &Args,
    config: &PipelineConfig,
    shutdown: &CancelToken,
) -> Result<()> {
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        MULTIPART_CONTENT_TYPE
    );
    stream.write_all(header.as_bytes())?;

    let mut frames = FrameStream::new(ctx, source, shutdown.clone());
    if let Some(dir) = &args.snapshots {
        let sink = SnapshotSink::new(dir, config.snapshot_interval(), config.jpeg_quality)?;
        frames = frames.with_sink(Box::new(sink));
    }

    // 写失败 = 客户端断开; 关闭后摄像头立即释放
    while let Some(chunk) = frames.next() {
        let bytes = chunk?;
        if let Err(e) = stream.write_all(&bytes).and_then(|_| stream.flush()) {
            log::info!("client gone: {}", e);
            break;
        }
    }
    frames.close();
    Ok(())
}

/// 每个视频流请求打开一次输入源
fn open_source(
    args: &Args,
    config: &PipelineConfig,
) -> social_distance_rs::Result<Box<dyn FrameSource>> {
    if !args.images.is_empty() {
        let source = match args.images.as_slice() {
            [dir] if dir.is_dir() => StillImageSource::from_dir(dir)?,
            paths => StillImageSource::from_paths(paths)?,
        };
        return Ok(Box::new(source.with_interval(STILL_IMAGE_INTERVAL)));
    }

    #[cfg(feature = "camera")]
    {
        let camera = social_distance_rs::input::CameraSource::open(
            args.camera,
            config.capture_timeout(),
            config.camera_video_size.clone(),
        )?;
        Ok(Box::new(camera))
    }
    #[cfg(not(feature = "camera"))]
    {
        let _ = config;
        Err(social_distance_rs::PipelineError::Configuration(
            "built without the `camera` feature; use --images".to_string(),
        ))
    }
}

fn read_request(stream: &mut TcpStream) -> Result<(String, String)> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    parse_request_line(&String::from_utf8_lossy(&data))
}

fn parse_request_line(text: &str) -> Result<(String, String)> {
    let request_line = text.lines().next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let path = raw_path.split('?').next().unwrap_or(raw_path);
    Ok((method.to_string(), path.to_string()))
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line,
        content_type,
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(route("GET", "/"), Route::Index);
        assert_eq!(route("GET", "/health"), Route::Health);
        assert_eq!(route("GET", "/stream/video"), Route::Stream);
        assert_eq!(route("GET", "/login"), Route::NotFound);
        assert_eq!(route("POST", "/stream/video"), Route::MethodNotAllowed);
    }

    #[test]
    fn test_parse_request_line() {
        let (m, p) =
            parse_request_line("GET /stream/video?t=1 HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(m, "GET");
        assert_eq!(p, "/stream/video");
        assert!(parse_request_line("").is_err());
        assert!(parse_request_line("GET").is_err());
    }
}
