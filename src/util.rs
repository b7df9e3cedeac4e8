use std::path::Path;

use directories::BaseDirs;

use ratatui::{buffer::Buffer, layout::Rect, style::Color};

pub fn fill_bg(buf: &mut Buffer, area: Rect, color: Color) {
    let area = area.intersection(buf.area);
    for x in area.left()..area.right() {
        for y in area.top()..area.bottom() {
            buf[(x, y)].set_bg(color);
        }
    }
}

pub fn pad<S: AsRef<str>>(s: S, pad: usize) -> String {
    let padding = " ".repeat(pad);
    format!("{padding}{}{padding}", s.as_ref())
}

pub fn abbreviate_home(path: &Path) -> String {
    let Some(base_dirs) = BaseDirs::new() else {
        return path.display().to_string();
    };
    let home = base_dirs.home_dir();
    if let Ok(rest) = path.strip_prefix(home) {
        if rest.as_os_str().is_empty() {
            "~".to_string()
        } else {
            format!("~/{}", rest.display())
        }
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_surrounds_with_spaces() {
        assert_eq!(pad("Download logs", 1), " Download logs ");
        assert_eq!(pad("x", 0), "x");
    }

    #[test]
    fn abbreviate_home_leaves_other_paths() {
        assert_eq!(
            abbreviate_home(Path::new("/definitely/not/home/out.jsonl")),
            "/definitely/not/home/out.jsonl"
        );
    }
}
