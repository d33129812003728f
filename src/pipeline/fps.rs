use std::time::Instant;

/// 瞬时帧率: 1 / 两次采集的间隔, 向下取整
///
/// 第一帧为 0; 间隔为 0 时沿用上一次的值.
#[derive(Debug, Default, Clone)]
pub struct FpsCounter {
    last: Option<Instant>,
    fps: u32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> u32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> u32 {
        if let Some(prev) = self.last {
            let elapsed = now.saturating_duration_since(prev).as_secs_f64();
            if elapsed > 0.0 {
                self.fps = (1.0 / elapsed).floor() as u32;
            }
        }
        self.last = Some(now);
        self.fps
    }

    pub fn current(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_frame_is_zero() {
        let mut c = FpsCounter::new();
        assert_eq!(c.tick_at(Instant::now()), 0);
    }

    #[test]
    fn test_floor_of_inverse_interval() {
        let mut c = FpsCounter::new();
        let t0 = Instant::now();
        c.tick_at(t0);
        assert_eq!(c.tick_at(t0 + Duration::from_millis(40)), 25);
        // 1 / 0.03 = 33.3
        assert_eq!(c.tick_at(t0 + Duration::from_millis(70)), 33);
        assert_eq!(c.tick_at(t0 + Duration::from_millis(2070)), 0);
    }

    #[test]
    fn test_zero_interval_keeps_previous() {
        let mut c = FpsCounter::new();
        let t0 = Instant::now();
        c.tick_at(t0);
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(c.tick_at(t1), 10);
        assert_eq!(c.tick_at(t1), 10);
        assert_eq!(c.current(), 10);
    }
}
