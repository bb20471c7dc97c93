use clap::Parser;
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 12207)]
    pub port: u16,

    /// Root directory for session data (plots.json per session)
    #[arg(long, env = "LAND_PLOTS_OUTPUT_ROOT")]
    pub output_root: String,

    /// Default drawing surface width in pixels
    #[arg(long, env = "LAND_PLOTS_CANVAS_WIDTH", default_value_t = 800)]
    pub canvas_width: u32,

    /// Default drawing surface height in pixels
    #[arg(long, env = "LAND_PLOTS_CANVAS_HEIGHT", default_value_t = 600)]
    pub canvas_height: u32,

    /// Crop selected when a session is opened
    #[arg(long, env = "LAND_PLOTS_DEFAULT_CROP", default_value = "Corn")]
    pub default_crop: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["land-plots", "--output-root", "/tmp/plots"]).unwrap();
        assert_eq!(args.port, 12207);
        assert_eq!(args.canvas_width, 800);
        assert_eq!(args.canvas_height, 600);
        assert_eq!(args.output_root, "/tmp/plots");
    }
}
