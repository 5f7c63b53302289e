//! The `check-tools` command.

use crate::config;
use crate::media::Ffmpeg;

/// Check for ffmpeg / ffprobe and catalog credentials
pub fn cmd_check_tools() -> anyhow::Result<()> {
    let config = config::load();
    println!("Checking media tools...\n");

    let tools = Ffmpeg::from_config(&config.tools);
    let mut missing = false;
    for (name, path) in [("ffmpeg", tools.ffmpeg_path()), ("ffprobe", tools.ffprobe_path())] {
        match path {
            Some(path) => println!("✓ {}: {}", name, path.display()),
            None => {
                println!("✗ {}: NOT FOUND", name);
                missing = true;
            }
        }
    }
    if missing {
        print_ffmpeg_install_instructions();
    }

    println!();
    println!("Catalog credentials:");
    let has_id = config.credentials.client_id.is_some() || std::env::var("SPOTIFY_CLIENT_ID").is_ok();
    let has_secret =
        config.credentials.client_secret.is_some() || std::env::var("SPOTIFY_CLIENT_SECRET").is_ok();
    if has_id && has_secret {
        println!("✓ client id and secret: set");
    } else {
        println!("✗ client id and secret: not set");
        println!("  Create an app at: https://developer.spotify.com/dashboard");
    }

    Ok(())
}

/// Print installation instructions for ffmpeg
fn print_ffmpeg_install_instructions() {
    eprintln!("Amazon downloads need ffmpeg and ffprobe for decryption.");
    eprintln!("Install FFmpeg:");
    eprintln!("  Windows: winget install Gyan.FFmpeg");
    eprintln!("  macOS:   brew install ffmpeg");
    eprintln!("  Linux:   apt install ffmpeg");
}
