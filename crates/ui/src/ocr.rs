//! OCR text extraction via tesseract TSV output. Last resort of the
//! fallback chain, and the only read-only tier.

use crate::error::{UiError, UiResult};
use crate::types::Point;
use serde::Serialize;
use std::path::Path;
use tokio::process::Command;

#[derive(Debug, Clone, Serialize)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl OcrWord {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }
}

pub(crate) fn parse_tesseract_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();
    for (idx, line) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let confidence = cols[10].parse::<f32>().unwrap_or(-1.0);
        if confidence < 0.0 {
            continue;
        }
        let x = cols[6].parse::<i32>().unwrap_or(-1);
        let y = cols[7].parse::<i32>().unwrap_or(-1);
        let width = cols[8].parse::<i32>().unwrap_or(0);
        let height = cols[9].parse::<i32>().unwrap_or(0);
        if x < 0 || y < 0 || width <= 0 || height <= 0 {
            continue;
        }
        words.push(OcrWord {
            text: text.to_string(),
            confidence,
            x,
            y,
            width,
            height,
        });
    }
    words
}

/// Run tesseract over an image and return recognized words with boxes.
pub async fn read_words(image_path: &Path, lang: Option<&str>) -> UiResult<Vec<OcrWord>> {
    let image = image_path.to_string_lossy().to_string();
    let mut args = vec![image.as_str(), "stdout", "tsv"];
    if let Some(lang) = lang {
        args.push("-l");
        args.push(lang);
    }

    let output = Command::new("tesseract").args(&args).output().await.map_err(|e| {
        UiError::OperationFailed(format!("tesseract not runnable (install 'tesseract'): {e}"))
    })?;
    if !output.status.success() {
        return Err(UiError::OperationFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    Ok(parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout)))
}

/// Join recognized words into a single text blob.
pub async fn read_text(image_path: &Path, lang: Option<&str>) -> UiResult<String> {
    let words = read_words(image_path, lang).await?;
    Ok(words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<&str>>()
        .join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn parses_well_formed_rows() {
        let tsv = format!(
            "{HEADER}\n5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t96.5\tSubmit\n5\t1\t1\t1\t1\t2\t60\t20\t30\t12\t88.0\tOrder\n"
        );
        let words = parse_tesseract_tsv(&tsv);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Submit");
        assert_eq!(words[0].center(), Point { x: 30, y: 26 });
    }

    #[test]
    fn skips_low_confidence_and_malformed_rows() {
        let tsv = format!(
            "{HEADER}\n5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t-1\tghost\nshort\trow\n5\t1\t1\t1\t1\t2\t10\t20\t0\t12\t90\tzero-width\n"
        );
        assert!(parse_tesseract_tsv(&tsv).is_empty());
    }
}
