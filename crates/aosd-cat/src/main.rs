//! aosd-cat
//!
//! Reads lines of text from files or standard input and flashes each one as an
//! on-screen display.

mod config;
mod scrollback;
mod text;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aosd::{Geometry, Renderer, Session};
use config::{Config, TransparencyMode};
use scrollback::Scrollback;
use text::{TextRenderer, TextStyle};

#[derive(Parser, Debug)]
#[command(name = "aosd-cat")]
#[command(about = "Display text from files or standard input as an on-screen display")]
#[command(version)]
struct Args {
    /// Files to read, `-` for standard input (the default)
    files: Vec<PathBuf>,

    /// Config file (defaults to ~/.config/aosd/aosd-cat.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    // Appearance
    /// Font family
    #[arg(short = 'n', long)]
    font: Option<String>,

    /// Font size in pixels
    #[arg(long)]
    font_size: Option<f32>,

    /// Wrap lines at this width in pixels (0 = never)
    #[arg(short = 'W', long)]
    wrap_width: Option<u32>,

    /// Margin from the window edge to the text
    #[arg(short = 'd', long)]
    padding: Option<u32>,

    /// Transparency mode
    #[arg(short = 'm', long, value_enum)]
    transparency: Option<TransparencyMode>,

    // Geometry
    /// Window position, 0 (top-left) to 8 (bottom-right)
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u8).range(0..=8))]
    position: Option<u8>,

    #[arg(short = 'x', long, allow_negative_numbers = true)]
    x_offset: Option<i32>,

    #[arg(short = 'y', long, allow_negative_numbers = true)]
    y_offset: Option<i32>,

    #[arg(short = 'e', long, allow_negative_numbers = true)]
    shadow_offset: Option<i32>,

    // Colouring
    #[arg(short = 'r', long)]
    fore_color: Option<String>,

    #[arg(short = 'w', long)]
    shadow_color: Option<String>,

    #[arg(short = 't', long)]
    back_color: Option<String>,

    #[arg(short = 'f', long)]
    fore_opacity: Option<u8>,

    #[arg(short = 's', long)]
    shadow_opacity: Option<u8>,

    #[arg(short = 'b', long)]
    back_opacity: Option<u8>,

    // Timing (milliseconds)
    #[arg(short = 'i', long)]
    fade_in: Option<u32>,

    /// Time shown at full opacity
    #[arg(short = 'u', long)]
    fade_full: Option<u32>,

    #[arg(short = 'o', long)]
    fade_out: Option<u32>,

    // Scrollback
    /// Number of lines shown at once
    #[arg(short = 'l', long)]
    lines: Option<usize>,

    /// Drop lines older than this many milliseconds (0 = never)
    #[arg(short = 'a', long)]
    age: Option<u64>,
}

impl Args {
    /// Command-line values win over the config file.
    fn apply(&self, config: &mut Config) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        let appearance = &mut config.appearance;
        set(&mut appearance.font_family, &self.font);
        set(&mut appearance.font_size, &self.font_size);
        set(&mut appearance.wrap_width, &self.wrap_width);
        set(&mut appearance.padding, &self.padding);
        set(&mut appearance.transparency, &self.transparency);

        let placement = &mut config.placement;
        set(&mut placement.position, &self.position);
        set(&mut placement.x_offset, &self.x_offset);
        set(&mut placement.y_offset, &self.y_offset);
        set(&mut placement.shadow_offset, &self.shadow_offset);

        let colors = &mut config.colors;
        set(&mut colors.fore, &self.fore_color);
        set(&mut colors.shadow, &self.shadow_color);
        set(&mut colors.back, &self.back_color);
        set(&mut colors.fore_opacity, &self.fore_opacity);
        set(&mut colors.shadow_opacity, &self.shadow_opacity);
        set(&mut colors.back_opacity, &self.back_opacity);

        let timing = &mut config.timing;
        set(&mut timing.fade_in, &self.fade_in);
        set(&mut timing.fade_full, &self.fade_full);
        set(&mut timing.fade_out, &self.fade_out);

        set(&mut config.scrollback.lines, &self.lines);
        set(&mut config.scrollback.age, &self.age);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "aosd=info,aosd_cat=info,warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    args.apply(&mut config);
    let style = TextStyle::from_config(&config)?;

    let session = Session::new().context("Failed to open OSD session")?;
    session.set_names("aosd-cat", "Aosd");
    session.set_hide_on_mouse(true);
    let requested = config.appearance.transparency.into();
    session
        .set_transparency(requested)
        .context("Failed to set transparency")?;
    if session.transparency() != requested {
        info!(
            "{:?} transparency unavailable, using {:?}",
            requested,
            session.transparency()
        );
    }

    let mut cat = Cat {
        session,
        scrollback: Scrollback::new(config.scrollback.lines, config.scrollback.age),
        config,
        style,
        text: TextRenderer::new(),
    };

    let sources = if args.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.files.clone()
    };
    for source in &sources {
        let reader = open(source)?;
        for line in reader.lines() {
            let line = line.with_context(|| format!("Failed to read {}", source.display()))?;
            cat.show(line)?;
        }
    }

    cat.session.destroy();
    Ok(())
}

fn open(source: &Path) -> Result<Box<dyn BufRead>> {
    if source.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(source).with_context(|| format!("Failed to open {}", source.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

struct Cat {
    session: Session,
    config: Config,
    style: TextStyle,
    text: TextRenderer,
    scrollback: Scrollback,
}

impl Cat {
    /// Flash `line` together with the scrollback. Blocks for the whole flash.
    fn show(&mut self, line: String) -> Result<()> {
        let now = Instant::now();
        self.scrollback.push(line, now);
        let visible = self.scrollback.visible(now);

        let Some(frame) = self.text.render(&visible, &self.style) else {
            debug!("Nothing to draw for {:?}", visible);
            return Ok(());
        };

        let placement = &self.config.placement;
        self.session.set_geometry(
            Geometry::at_position(placement.position, frame.width(), frame.height())
                .with_offset(placement.x_offset, placement.y_offset),
        );
        self.session.set_renderer(Some(Renderer::new(move |canvas| {
            canvas.draw_pixmap(0, 0, frame.as_ref(), 1.0);
        })));

        let timing = &self.config.timing;
        self.session
            .flash(timing.fade_in, timing.fade_full, timing.fade_out)
            .context("Failed to display OSD")
    }
}
