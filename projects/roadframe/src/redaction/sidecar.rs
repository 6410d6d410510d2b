// Box sidecar files: one box per line, whitespace separated.
//
// Two layouts exist and are never mixed:
//   pixel       `x_min y_min x_max y_max`   (redaction stage)
//   normalized  `class_id cx cy w h`        (detection / annotation stage)

use super::coords::{NormalizedBox, PixelBox};
use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Subfolder of a redaction output folder holding the pixel sidecars.
pub const PIXEL_SIDECAR_DIR: &str = "annot_txt";

/// `<dir>/<image stem>.txt`
pub fn sidecar_path(dir: &Path, image_name: &str) -> PathBuf {
    let stem = Path::new(image_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(image_name);
    dir.join(format!("{}.txt", stem))
}

/// Replaces the sidecar at `path` with `boxes`. An empty list leaves an empty file.
pub fn write_pixel_boxes(path: &Path, boxes: &[PixelBox]) -> Result<()> {
    let mut out = String::new();
    for b in boxes {
        let _ = writeln!(out, "{} {} {} {}", b.x_min, b.y_min, b.x_max, b.y_max);
    }
    fs::write(path, out)?;
    Ok(())
}

pub fn read_pixel_boxes(path: &Path) -> Result<Vec<PixelBox>> {
    let content = fs::read_to_string(path)?;
    parse_lines(path, &content, 4, |fields| {
        Ok(PixelBox {
            x_min: fields[0].parse().map_err(|_| fields[0].to_string())?,
            y_min: fields[1].parse().map_err(|_| fields[1].to_string())?,
            x_max: fields[2].parse().map_err(|_| fields[2].to_string())?,
            y_max: fields[3].parse().map_err(|_| fields[3].to_string())?,
        })
    })
}

/// Writes normalized boxes; a missing class is written as `0`.
pub fn write_normalized_boxes(path: &Path, boxes: &[NormalizedBox]) -> Result<()> {
    let mut out = String::new();
    for b in boxes {
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            b.class_id.unwrap_or(0),
            b.cx,
            b.cy,
            b.w,
            b.h
        );
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
pub fn read_normalized_boxes(path: &Path) -> Result<Vec<NormalizedBox>> {
    let content = fs::read_to_string(path)?;
    parse_lines(path, &content, 5, |fields| {
        Ok(NormalizedBox {
            class_id: Some(fields[0].parse().map_err(|_| fields[0].to_string())?),
            cx: fields[1].parse().map_err(|_| fields[1].to_string())?,
            cy: fields[2].parse().map_err(|_| fields[2].to_string())?,
            w: fields[3].parse().map_err(|_| fields[3].to_string())?,
            h: fields[4].parse().map_err(|_| fields[4].to_string())?,
        })
    })
}

fn parse_lines<T, F>(path: &Path, content: &str, arity: usize, parse: F) -> Result<Vec<T>>
where
    F: Fn(&[&str]) -> std::result::Result<T, String>,
{
    let mut boxes = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != arity {
            return Err(Error::input(format!(
                "{}:{}: expected {} fields, found {}",
                path.display(),
                n + 1,
                arity,
                fields.len()
            )));
        }
        let b = parse(&fields).map_err(|bad| {
            Error::input(format!(
                "{}:{}: invalid number '{}'",
                path.display(),
                n + 1,
                bad
            ))
        })?;
        boxes.push(b);
    }
    Ok(boxes)
}
