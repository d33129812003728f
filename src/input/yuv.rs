//! YUV420P → RGB 转换 (BT.601, 定点系数 ×128)

/// 平面 + 步长描述的一帧 YUV420P 数据
pub struct Yuv420pPlanes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub y_stride: usize,
    pub u_stride: usize,
    pub v_stride: usize,
}

impl Yuv420pPlanes<'_> {
    /// 平面长度是否足够覆盖 width × height
    pub fn covers(&self, width: usize, height: usize) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let cw = width.div_ceil(2);
        let ch = height.div_ceil(2);
        self.y_stride >= width
            && self.u_stride >= cw
            && self.v_stride >= cw
            && self.y.len() >= (height - 1) * self.y_stride + width
            && self.u.len() >= (ch - 1) * self.u_stride + cw
            && self.v.len() >= (ch - 1) * self.v_stride + cw
    }
}

/// 转换为紧密排列的 RGB24, 平面不足时返回 None
pub fn yuv420p_to_rgb(planes: &Yuv420pPlanes, width: usize, height: usize) -> Option<Vec<u8>> {
    if !planes.covers(width, height) {
        return None;
    }

    let mut out = vec![0u8; width * height * 3];
    for (row, line) in out.chunks_exact_mut(width * 3).enumerate() {
        let y_row = &planes.y[row * planes.y_stride..];
        let u_row = &planes.u[(row >> 1) * planes.u_stride..];
        let v_row = &planes.v[(row >> 1) * planes.v_stride..];

        for (x, px) in line.chunks_exact_mut(3).enumerate() {
            let y = y_row[x] as i32;
            let u = u_row[x >> 1] as i32 - 128;
            let v = v_row[x >> 1] as i32 - 128;

            px[0] = (y + ((v * 179) >> 7)).clamp(0, 255) as u8;
            px[1] = (y - ((u * 44) >> 7) - ((v * 91) >> 7)).clamp(0, 255) as u8;
            px[2] = (y + ((u * 227) >> 7)).clamp(0, 255) as u8;
        }
    }
    Some(out)
}
