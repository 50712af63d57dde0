//! Where finished figures go: image files, the terminal, both or neither.

use super::display::show_figure;
use super::render::{render, ImageFormat};
use super::{Figure, FigureSink};
use crate::error::PlotError;
use log::{debug, warn};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Output {
    /// Directory for PNG files, created on first use
    pub save_dir: Option<PathBuf>,
    /// Also write an SVG next to each PNG
    pub svg: bool,
    /// Display each figure in the terminal
    pub show: bool,
}

impl Output {
    pub fn new(save_dir: Option<PathBuf>, show: bool) -> Self {
        Self {
            save_dir,
            svg: false,
            show,
        }
    }

    pub fn with_svg(mut self, svg: bool) -> Self {
        self.svg = svg;
        self
    }
}

/// Write `figure` into `dir` (created if missing) and return the file path
pub fn save_figure(figure: &Figure, dir: &Path, format: ImageFormat) -> Result<PathBuf, PlotError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(figure.file_name(format));
    render(figure, &path, format)?;
    Ok(path)
}

impl FigureSink for Output {
    fn emit(&mut self, figure: Figure) -> Result<(), PlotError> {
        if let Some(dir) = &self.save_dir {
            let path = save_figure(&figure, dir, ImageFormat::Png)?;
            println!("Saved: {}", path.display());
            if self.svg {
                let path = save_figure(&figure, dir, ImageFormat::Svg)?;
                println!("Saved: {}", path.display());
            }
        }

        if self.show {
            if std::io::stdout().is_terminal() {
                show_figure(&figure)?;
            } else {
                warn!("stdout is not a terminal; not showing '{}'", figure.title);
            }
        } else {
            debug!("rendered '{}'", figure.title);
        }
        Ok(())
    }
}
