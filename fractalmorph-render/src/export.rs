//! PNG export with embedded metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use crate::bitmap::Bitmap;
use crate::error::RenderError;

/// Metadata to embed in an exported PNG as tEXt chunks.
pub struct ExportMetadata {
    pub formula_name: String,
    pub center_re: String,
    pub center_im: String,
    pub zoom_level: String,
    pub max_iterations: u32,
    pub oversampling: u32,
    pub julia_c_re: Option<String>,
    pub julia_c_im: Option<String>,
}

/// Writes a [`Bitmap`] as a PNG file, flipping to PNG's top-down row order
/// and embedding fractal parameters as custom tEXt chunks.
///
/// Uses the `png` crate directly (rather than `image`) to inject custom
/// chunks readable by exiftool, IrfanView, XnView, etc.
pub fn export_png(bitmap: &Bitmap, path: &Path, metadata: &ExportMetadata) -> Result<(), RenderError> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, bitmap.width, bitmap.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder
        .add_text_chunk("Software".to_string(), "fractalmorph".to_string())
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    encoder
        .add_text_chunk("Description".to_string(), build_description(metadata))
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    for (key, value) in build_metadata_pairs(metadata) {
        encoder
            .add_text_chunk(key, value)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
    }

    let mut png_writer = encoder.write_header().map_err(|e| std::io::Error::other(e.to_string()))?;
    png_writer
        .write_image_data(&bitmap.to_top_down_rgba())
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    debug!(width = bitmap.width, height = bitmap.height, path = %path.display(), "exported PNG");
    Ok(())
}

fn build_description(meta: &ExportMetadata) -> String {
    let mut desc = format!(
        "{} - Center: {} {}i, Zoom: {}, Iterations: {}",
        meta.formula_name, meta.center_re, meta.center_im, meta.zoom_level, meta.max_iterations,
    );
    if let (Some(re), Some(im)) = (&meta.julia_c_re, &meta.julia_c_im) {
        desc.push_str(&format!(", Julia C: {re} {im}i"));
    }
    desc
}

fn build_metadata_pairs(meta: &ExportMetadata) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("fractalmorph.Formula".into(), meta.formula_name.clone()),
        ("fractalmorph.CenterRe".into(), meta.center_re.clone()),
        ("fractalmorph.CenterIm".into(), meta.center_im.clone()),
        ("fractalmorph.ZoomLevel".into(), meta.zoom_level.clone()),
        ("fractalmorph.MaxIterations".into(), meta.max_iterations.to_string()),
        ("fractalmorph.Oversampling".into(), meta.oversampling.to_string()),
    ];
    if let Some(re) = &meta.julia_c_re {
        pairs.push(("fractalmorph.JuliaC_Re".into(), re.clone()));
    }
    if let Some(im) = &meta.julia_c_im {
        pairs.push(("fractalmorph.JuliaC_Im".into(), im.clone()));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn meta() -> ExportMetadata {
        ExportMetadata {
            formula_name: "mandelbrot-2".into(),
            center_re: "-0.5".into(),
            center_im: "0.0".into(),
            zoom_level: "1.0".into(),
            max_iterations: 256,
            oversampling: 1,
            julia_c_re: None,
            julia_c_im: None,
        }
    }

    #[test]
    fn export_creates_valid_png() {
        let bitmap = Bitmap::new(4, 4);
        let dir = std::env::temp_dir().join("fractalmorph_test_export");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("test_export.png");
        export_png(&bitmap, &path, &meta()).expect("export should succeed");

        let mut file = std::fs::File::open(&path).expect("file should exist");
        let mut header = [0u8; 8];
        file.read_exact(&mut header).expect("should read header");
        assert_eq!(&header, b"\x89PNG\r\n\x1a\n", "valid PNG signature");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn export_embeds_text_chunks() {
        let bitmap = Bitmap::new(2, 2);
        let mut m = meta();
        m.julia_c_re = Some("-0.7".into());
        m.julia_c_im = Some("0.27015".into());

        let dir = std::env::temp_dir().join("fractalmorph_test_export_meta");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("test_meta.png");
        export_png(&bitmap, &path, &m).expect("export should succeed");

        let decoder = png::Decoder::new(std::fs::File::open(&path).expect("file should exist"));
        let reader = decoder.read_info().expect("should read info");
        let info = reader.info();
        let texts: Vec<_> = info.uncompressed_latin1_text.iter().collect();
        assert!(
            texts.iter().any(|t| t.keyword == "Software" && t.text == "fractalmorph"),
            "should contain Software text chunk"
        );
        assert!(
            texts.iter().any(|t| t.keyword == "fractalmorph.Formula" && t.text == "mandelbrot-2"),
            "should contain formula chunk"
        );
        assert!(
            texts.iter().any(|t| t.keyword == "fractalmorph.JuliaC_Re"),
            "should contain Julia C Re chunk"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
