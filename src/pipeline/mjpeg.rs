//! MJPEG 推流分帧 (multipart/x-mixed-replace)

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::{PipelineError, Result};

pub const BOUNDARY: &str = "frame";

/// HTTP 响应的 Content-Type
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpg\r\n\r\n";
const PART_TRAILER: &[u8] = b"\r\n";

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(image.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buf)
}

/// `--frame` 分隔 + 头 + 空行 + JPEG + CRLF
pub fn multipart_chunk(jpeg: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(PART_HEADER.len() + jpeg.len() + PART_TRAILER.len());
    chunk.extend_from_slice(PART_HEADER);
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(PART_TRAILER);
    chunk
}

/// 拆出分帧中的 JPEG 数据 (测试与调试用)
pub fn split_chunk(chunk: &[u8]) -> Option<&[u8]> {
    chunk
        .strip_prefix(PART_HEADER)
        .and_then(|rest| rest.strip_suffix(PART_TRAILER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_chunk_framing() {
        let chunk = multipart_chunk(&[0xFF, 0xD8, 0x01, 0xFF, 0xD9]);
        assert!(chunk.starts_with(b"--frame\r\nContent-Type: image/jpg\r\n\r\n"));
        assert!(chunk.ends_with(b"\xFF\xD9\r\n"));
        assert_eq!(split_chunk(&chunk), Some(&[0xFF, 0xD8, 0x01, 0xFF, 0xD9][..]));
        assert_eq!(split_chunk(b"nope"), None);
    }

    #[test]
    fn test_encode_jpeg_markers() {
        let img = RgbImage::from_pixel(16, 8, Rgb([200, 10, 10]));
        let jpeg = encode_jpeg(&img, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_boundary_matches_content_type() {
        assert!(MULTIPART_CONTENT_TYPE.ends_with(&format!("boundary={}", BOUNDARY)));
    }
}
