use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;

fn ansi(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(color)))
}

/// Help output colors shared by all subcommands.
pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(ansi(AnsiColor::Green).bold().underline())
        .header(ansi(AnsiColor::Green).bold().underline())
        .literal(ansi(AnsiColor::Cyan).bold())
        .invalid(ansi(AnsiColor::Red).bold())
        .error(ansi(AnsiColor::Red).bold())
        .valid(ansi(AnsiColor::Cyan).bold())
        .placeholder(ansi(AnsiColor::BrightBlack))
}
