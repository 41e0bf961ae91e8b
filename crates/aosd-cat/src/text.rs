//! Text layout and rasterization with cosmic-text
//!
//! Each OSD frame is drawn once into a pixmap: the background rectangle, the text in
//! the shadow colour at the shadow offset, then the text in the foreground colour.

use anyhow::{Context, Result, bail};
use cosmic_text::{
    Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, SwashContent,
};
use tiny_skia::{Color, ColorU8, Pixmap};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub wrap_width: Option<f32>,
    pub padding: u32,
    pub shadow_offset: i32,
    pub fore: Color,
    pub shadow: Color,
    pub back: Color,
}

impl TextStyle {
    pub fn from_config(config: &Config) -> Result<Self> {
        let colors = &config.colors;
        let appearance = &config.appearance;
        Ok(Self {
            font_family: appearance.font_family.clone(),
            font_size: appearance.font_size,
            wrap_width: (appearance.wrap_width > 0).then_some(appearance.wrap_width as f32),
            padding: appearance.padding,
            shadow_offset: config.placement.shadow_offset,
            fore: parse_color(&colors.fore, colors.fore_opacity).context("Invalid fore colour")?,
            shadow: parse_color(&colors.shadow, colors.shadow_opacity)
                .context("Invalid shadow colour")?,
            back: parse_color(&colors.back, colors.back_opacity).context("Invalid back colour")?,
        })
    }
}

/// Shapes text and draws it into OSD-sized pixmaps.
pub struct TextRenderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
        }
    }

    /// Draw `text` into a pixmap sized to fit it plus padding and shadow.
    pub fn render(&mut self, text: &str, style: &TextStyle) -> Option<Pixmap> {
        let metrics = Metrics::new(style.font_size, style.font_size * 1.2);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, style.wrap_width, None);
        let attrs = Attrs::new().family(family(&style.font_family));
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let (mut text_width, mut text_height) = (0.0f32, 0.0f32);
        for run in buffer.layout_runs() {
            text_width = text_width.max(run.line_w);
            text_height += run.line_height;
        }

        let (width, height) = frame_size(text_width, text_height, style.padding, style.shadow_offset);
        let mut pixmap = Pixmap::new(width, height)?;
        pixmap.fill(style.back);

        // The text origin leaves room for a shadow cast up or left
        let origin_x = style.padding as i32 + (-style.shadow_offset).max(0);
        let origin_y = origin_x;
        let mut layers = Vec::with_capacity(2);
        if style.shadow_offset != 0 {
            let offset = style.shadow_offset;
            layers.push((origin_x + offset, origin_y + offset, style.shadow));
        }
        layers.push((origin_x, origin_y, style.fore));

        for (x, y, color) in layers {
            let color = color.to_color_u8();
            for run in buffer.layout_runs() {
                for glyph in run.glyphs.iter() {
                    let physical = glyph.physical((x as f32, y as f32 + run.line_y), 1.0);
                    let Some(image) = self
                        .swash_cache
                        .get_image(&mut self.font_system, physical.cache_key)
                    else {
                        continue;
                    };
                    let mask: Vec<u8> = match image.content {
                        SwashContent::Mask => image.data.clone(),
                        // Colour glyphs contribute their coverage only
                        SwashContent::Color => image.data.chunks_exact(4).map(|px| px[3]).collect(),
                        SwashContent::SubpixelMask => continue,
                    };
                    blend_mask(
                        &mut pixmap,
                        &mask,
                        image.placement.width,
                        image.placement.height,
                        physical.x + image.placement.left,
                        physical.y - image.placement.top,
                        color,
                    );
                }
            }
        }
        Some(pixmap)
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn family(name: &str) -> Family<'_> {
    match name.to_lowercase().as_str() {
        "sans" | "sans-serif" => Family::SansSerif,
        "serif" => Family::Serif,
        "mono" | "monospace" => Family::Monospace,
        _ => Family::Name(name),
    }
}

fn frame_size(text_width: f32, text_height: f32, padding: u32, shadow_offset: i32) -> (u32, u32) {
    let extra = 2 * padding + shadow_offset.unsigned_abs();
    let width = text_width.ceil() as u32 + extra;
    let height = text_height.ceil() as u32 + extra;
    (width.max(1), height.max(1))
}

/// Source-over a coverage mask in `color` onto a premultiplied pixmap.
fn blend_mask(
    pixmap: &mut Pixmap,
    mask: &[u8],
    mask_width: u32,
    mask_height: u32,
    dest_x: i32,
    dest_y: i32,
    color: ColorU8,
) {
    let pixmap_width = pixmap.width() as i32;
    let pixmap_height = pixmap.height() as i32;
    let data = pixmap.data_mut();

    for gy in 0..mask_height as i32 {
        let py = dest_y + gy;
        if py < 0 || py >= pixmap_height {
            continue;
        }
        for gx in 0..mask_width as i32 {
            let px = dest_x + gx;
            if px < 0 || px >= pixmap_width {
                continue;
            }
            let Some(&coverage) = mask.get((gy as u32 * mask_width + gx as u32) as usize) else {
                continue;
            };
            if coverage == 0 {
                continue;
            }

            let idx = ((py * pixmap_width + px) * 4) as usize;
            let src_a = coverage as u32 * color.alpha() as u32 / 255;
            let inv_a = 255 - src_a;
            let channels = [color.red(), color.green(), color.blue()];
            for (offset, channel) in channels.into_iter().enumerate() {
                let dst = data[idx + offset] as u32;
                data[idx + offset] = ((channel as u32 * src_a + dst * inv_a) / 255) as u8;
            }
            data[idx + 3] = (src_a + data[idx + 3] as u32 * inv_a / 255) as u8;
        }
    }
}

/// Parse `#rrggbb`, `#rgb` or a colour name, with the given opacity.
pub fn parse_color(value: &str, opacity: u8) -> Result<Color> {
    let value = value.trim();
    let [r, g, b] = match value.strip_prefix('#') {
        Some(hex) => parse_hex(hex).with_context(|| format!("Bad hex colour {value:?}"))?,
        None => named_color(&value.to_lowercase())
            .with_context(|| format!("Unknown colour name {value:?}"))?,
    };
    Ok(Color::from_rgba8(r, g, b, opacity))
}

fn parse_hex(hex: &str) -> Result<[u8; 3]> {
    if !hex.is_ascii() {
        bail!("not ASCII");
    }
    let digits: Vec<u8> = match hex.len() {
        6 => (0..3)
            .map(|i| u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16))
            .collect::<Result<_, _>>()?,
        3 => hex
            .chars()
            .map(|c| u8::from_str_radix(&c.to_string(), 16).map(|v| v * 17))
            .collect::<Result<_, _>>()?,
        n => bail!("expected 3 or 6 digits, got {n}"),
    };
    Ok([digits[0], digits[1], digits[2]])
}

fn named_color(name: &str) -> Option<[u8; 3]> {
    let rgb = match name {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" | "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "gray" | "grey" => [190, 190, 190],
        "orange" => [255, 165, 0],
        "purple" => [160, 32, 240],
        "pink" => [255, 192, 203],
        _ => return None,
    };
    Some(rgb)
}
