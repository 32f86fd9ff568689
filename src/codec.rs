use anyhow::{Context, Result, anyhow};
use image::codecs::jpeg::JpegEncoder;
use regex::Regex;

/// Re-encode a raster candidate at the given quality. Returns the new bytes
/// without touching disk; the caller decides whether to write them. Any
/// decode/encode problem surfaces as an `Err` the pipeline treats as a
/// per-file failure, not a crash.
pub fn compress_raster(bytes: &[u8], ext: &str, quality: u8) -> Result<Vec<u8>> {
    match ext {
        "png" => compress_png(bytes, quality),
        "jpg" | "jpeg" => compress_jpeg(bytes, quality),
        other => Err(anyhow!("not a raster candidate: .{other}")),
    }
}

/// PNG: lossy palette quantization (libimagequant) followed by a lossless
/// structural pass (oxipng).
fn compress_png(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("decode png")?;
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width() as usize, rgba.height() as usize);

    let pixels: Vec<rgb::RGBA<u8>> = rgba
        .chunks_exact(4)
        .map(|c| rgb::RGBA::new(c[0], c[1], c[2], c[3]))
        .collect();

    let quality = quality.min(100);
    let mut attr = imagequant::Attributes::new();
    attr.set_quality(quality.saturating_sub(25), quality)
        .context("quantizer quality")?;
    let mut liq = imagequant::Image::new(&attr, pixels.as_slice(), w, h, 0.0)
        .context("quantizer image")?;
    let mut res = attr.quantize(&mut liq).context("quantize")?;
    res.set_dithering_level(1.0).context("dithering")?;
    let (palette, indexed) = res.remapped(&mut liq).context("remap")?;

    let mut expanded = Vec::with_capacity(w * h * 4);
    for idx in &indexed {
        let p = palette[*idx as usize];
        expanded.extend_from_slice(&[p.r, p.g, p.b, p.a]);
    }
    let quantized = image::RgbaImage::from_raw(rgba.width(), rgba.height(), expanded)
        .ok_or_else(|| anyhow!("rebuild quantized image"))?;

    let mut png_buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(quantized)
        .write_to(&mut png_buf, image::ImageFormat::Png)
        .context("encode png")?;

    let mut opts = oxipng::Options::from_preset(2);
    opts.strip = oxipng::StripChunks::Safe;
    oxipng::optimize_from_memory(png_buf.get_ref(), &opts).context("oxipng")
}

fn compress_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("decode jpeg")?;
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let mut enc = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    enc.encode_image(&rgb).context("encode jpeg")?;
    Ok(out)
}

/// Lossy WebP encode of whatever bytes are on disk at conversion time.
pub fn encode_webp(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("decode for webp")?;
    let rgba = img.to_rgba8();
    let enc = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let mem = enc.encode(quality.min(100) as f32);
    Ok(mem.to_vec())
}

/// Text-level SVG minification: drop XML comments, collapse inter-tag and
/// intra-tag whitespace.
pub fn minify_svg(content: &str) -> Result<String> {
    let comments = Regex::new(r"(?s)<!--.*?-->")?;
    let between_tags = Regex::new(r">\s+<")?;
    let runs = Regex::new(r"\s{2,}")?;

    let out = comments.replace_all(content, "");
    let out = between_tags.replace_all(&out, "><");
    let out = runs.replace_all(&out, " ");
    Ok(out.trim().to_string())
}
