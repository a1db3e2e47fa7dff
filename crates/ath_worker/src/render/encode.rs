//! SVG documents to output bytes.

use std::sync::{Arc, OnceLock};

use ath_protocol::RenderingFormat;
use resvg::{tiny_skia, usvg};
use svg2pdf::usvg::{TreeParsing, TreePostProc};

use crate::error::RenderError;

pub(crate) fn encode(svg: &str, format: RenderingFormat) -> Result<Vec<u8>, RenderError> {
    match format {
        RenderingFormat::Svg => Ok(svg.as_bytes().to_vec()),
        RenderingFormat::Png => to_png(svg),
        RenderingFormat::Pdf => to_pdf(svg),
    }
}

fn raster_fonts() -> Arc<usvg::fontdb::Database> {
    static FONTS: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            Arc::new(db)
        })
        .clone()
}

fn vector_fonts() -> &'static svg2pdf::usvg::fontdb::Database {
    static FONTS: OnceLock<svg2pdf::usvg::fontdb::Database> = OnceLock::new();
    FONTS.get_or_init(|| {
        let mut db = svg2pdf::usvg::fontdb::Database::new();
        db.load_system_fonts();
        db
    })
}

fn to_png(svg: &str) -> Result<Vec<u8>, RenderError> {
    let options = usvg::Options {
        fontdb: raster_fonts(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| RenderError::Svg(e.to_string()))?;

    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or(
        RenderError::InvalidSize {
            width: size.width(),
            height: size.height(),
        },
    )?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| RenderError::Png(e.to_string()))
}

fn to_pdf(svg: &str) -> Result<Vec<u8>, RenderError> {
    let mut tree = svg2pdf::usvg::Tree::from_str(svg, &svg2pdf::usvg::Options::default())
        .map_err(|e| RenderError::Svg(e.to_string()))?;
    tree.postprocess(svg2pdf::usvg::PostProcessingSteps::default(), vector_fonts());
    Ok(svg2pdf::convert_tree(&tree, svg2pdf::Options::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="30" viewBox="0 0 40 30"><rect x="5" y="5" width="20" height="10" fill="#1f77b4"/></svg>"##;

    #[test]
    fn svg_passes_through() {
        assert_eq!(encode(SVG, RenderingFormat::Svg).unwrap(), SVG.as_bytes());
    }

    #[test]
    fn png_has_signature() {
        let bytes = encode(SVG, RenderingFormat::Png).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn pdf_has_header() {
        let bytes = encode(SVG, RenderingFormat::Pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn malformed_svg_is_an_error() {
        assert!(matches!(
            encode("<svg", RenderingFormat::Png),
            Err(RenderError::Svg(_))
        ));
    }
}
