//! Background removal.
//!
//! The segmentation step is pluggable through [`BackgroundRemover`]. The
//! built-in [`BorderKeyRemover`] handles the common product-shot case of a
//! subject on a roughly uniform backdrop: it estimates the backdrop colour from
//! the image border and flood-fills everything connected to the border that is
//! within `tolerance` of it, making those pixels transparent.

use std::collections::VecDeque;

use image::{DynamicImage, Rgba, RgbaImage};

/// Turns an image into an RGBA image whose background is transparent.
pub trait BackgroundRemover: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Remove the background. `tolerance` is the per-channel colour distance
    /// (0-255) a pixel may have from the background and still be removed.
    fn remove(&self, img: &DynamicImage, tolerance: u8) -> Result<RgbaImage, String>;
}

/// Border-seeded flood-fill keyer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BorderKeyRemover;

impl BorderKeyRemover {
    pub fn new() -> Self {
        Self
    }
}

impl BackgroundRemover for BorderKeyRemover {
    fn name(&self) -> &'static str {
        "border-key"
    }

    fn remove(&self, img: &DynamicImage, tolerance: u8) -> Result<RgbaImage, String> {
        let mut rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err("image has zero area".to_string());
        }

        let key = border_colour(&rgba);
        let w = width as usize;
        let mut visited = vec![false; w * height as usize];
        let mut queue = VecDeque::new();

        let mut seed = |x: u32, y: u32, queue: &mut VecDeque<(u32, u32)>| {
            let idx = y as usize * w + x as usize;
            if !visited[idx] && matches_key(rgba.get_pixel(x, y), &key, tolerance) {
                visited[idx] = true;
                queue.push_back((x, y));
            }
        };

        for x in 0..width {
            seed(x, 0, &mut queue);
            seed(x, height - 1, &mut queue);
        }
        for y in 0..height {
            seed(0, y, &mut queue);
            seed(width - 1, y, &mut queue);
        }

        while let Some((x, y)) = queue.pop_front() {
            let neighbours = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbours {
                if nx < width && ny < height {
                    seed(nx, ny, &mut queue);
                }
            }
        }

        for (idx, removed) in visited.into_iter().enumerate() {
            if removed {
                let x = (idx % w) as u32;
                let y = (idx / w) as u32;
                rgba.get_pixel_mut(x, y)[3] = 0;
            }
        }

        Ok(rgba)
    }
}

/// Mean colour of the one-pixel border.
fn border_colour(img: &RgbaImage) -> [u8; 3] {
    let (width, height) = img.dimensions();
    let mut sum = [0u64; 3];
    let mut count = 0u64;

    let mut add = |p: &Rgba<u8>| {
        for c in 0..3 {
            sum[c] += p[c] as u64;
        }
        count += 1;
    };

    for x in 0..width {
        add(img.get_pixel(x, 0));
        if height > 1 {
            add(img.get_pixel(x, height - 1));
        }
    }
    for y in 1..height.saturating_sub(1) {
        add(img.get_pixel(0, y));
        if width > 1 {
            add(img.get_pixel(width - 1, y));
        }
    }

    let count = count.max(1);
    [
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    ]
}

fn matches_key(p: &Rgba<u8>, key: &[u8; 3], tolerance: u8) -> bool {
    (0..3).all(|c| p[c].abs_diff(key[c]) <= tolerance)
}
