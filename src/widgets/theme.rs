use std::{env, sync::OnceLock, time::Duration};

use ratatui::style::Color;

const THEME_ENV: &str = "VLOGS_EXPORT_THEME";
const LUMA_THRESHOLD: f32 = 0.6;
// Some terminals report noisy or transient luma right after startup; take a few
// samples and use the median to avoid a single bad read flipping the theme.
const LUMA_SAMPLES: usize = 5;
const LUMA_SAMPLE_DELAY: Duration = Duration::from_millis(20);

#[derive(Clone, Copy)]
pub struct Theme {
    bg: Color,
    panel_bg: Color,
    text: Color,
    text_muted: Color,
    accent: Color,
    border: Color,
    success: Color,
    error: Color,
}

impl Theme {
    pub fn default() -> Self {
        static THEME: OnceLock<Theme> = OnceLock::new();
        *THEME.get_or_init(|| {
            if let Some(theme) = env::var(THEME_ENV).ok().as_deref().and_then(Self::named) {
                return theme;
            }

            if let Some(luma) = detect_terminal_luma()
                && luma > LUMA_THRESHOLD
            {
                return Self::light();
            }

            Self::dark()
        })
    }

    fn named(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::light()),
            "dark" => Some(Self::dark()),
            _ => None,
        }
    }

    pub fn dark() -> Self {
        Self {
            bg: Color::Rgb(16, 16, 24),
            panel_bg: Color::Rgb(24, 24, 36),
            text: Color::Rgb(228, 228, 240),
            text_muted: Color::Rgb(150, 150, 172),
            accent: Color::Rgb(148, 126, 255),
            border: Color::Rgb(72, 70, 98),
            success: Color::Rgb(122, 204, 140),
            error: Color::Rgb(255, 110, 120),
        }
    }

    pub fn light() -> Self {
        Self {
            bg: Color::Rgb(246, 245, 250),
            panel_bg: Color::Rgb(255, 255, 255),
            text: Color::Rgb(30, 28, 44),
            text_muted: Color::Rgb(96, 92, 118),
            accent: Color::Rgb(98, 62, 210),
            border: Color::Rgb(170, 164, 196),
            success: Color::Rgb(30, 140, 70),
            error: Color::Rgb(200, 40, 56),
        }
    }

    pub fn bg(&self) -> Color {
        self.bg
    }

    pub fn panel_bg(&self) -> Color {
        self.panel_bg
    }

    pub fn text(&self) -> Color {
        self.text
    }

    pub fn text_muted(&self) -> Color {
        self.text_muted
    }

    pub fn accent(&self) -> Color {
        self.accent
    }

    pub fn border(&self) -> Color {
        self.border
    }

    pub fn success(&self) -> Color {
        self.success
    }

    pub fn error(&self) -> Color {
        self.error
    }
}

fn detect_terminal_luma() -> Option<f32> {
    let mut samples = Vec::with_capacity(LUMA_SAMPLES);
    for attempt in 0..LUMA_SAMPLES {
        if let Ok(luma) = terminal_light::luma()
            && luma.is_finite()
        {
            samples.push(luma);
        }
        if attempt + 1 < LUMA_SAMPLES {
            std::thread::sleep(LUMA_SAMPLE_DELAY);
        }
    }

    if samples.is_empty() {
        return None;
    }

    Some(median_luma(&mut samples))
}

fn median_luma(samples: &mut [f32]) -> f32 {
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len().is_multiple_of(2) {
        (samples[mid - 1] + samples[mid]) / 2.0
    } else {
        samples[mid]
    }
}
