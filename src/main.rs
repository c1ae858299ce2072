//! tonescope: play a tone and watch it live in the terminal
//!
//! Usage: tonescope [--list-devices] [--waveform <name>] [--seconds <n>]
//!
//! Opens the configured output device, plays the configured tone, sweeps
//! its frequency across the audible range and draws the analyser snapshot
//! as ASCII art a few times per second.

use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::time::Duration;

use tonescope_lib::audio::device::list_output_devices;
use tonescope_lib::audio::signals::{MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};
use tonescope_lib::config::Settings;
use tonescope_lib::logging::init_logging;
use tonescope_lib::monitor::DrawingSurface;
use tonescope_lib::{AsciiSurface, CpalDevice, FrameLoop, SampleFrame, ToneGenerator, Waveform};

const SCREEN_WIDTH: u32 = 80;
const SCREEN_HEIGHT: u32 = 16;
/// Print the waveform every this many frames
const PRINT_INTERVAL: u64 = 15;
/// Longest accepted `--seconds` (one day)
const MAX_SECONDS: f64 = 86_400.0;

struct Args {
    list_devices: bool,
    waveform: Option<Waveform>,
    seconds: f64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        list_devices: false,
        waveform: None,
        seconds: 5.0,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list-devices" => args.list_devices = true,
            "--waveform" => {
                let value = iter.next().ok_or("--waveform needs a value")?;
                args.waveform = Some(value.parse()?);
            }
            "--seconds" => {
                let value = iter.next().ok_or("--seconds needs a value")?;
                args.seconds = parse_seconds(&value)?;
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(args)
}

fn parse_seconds(value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|s| *s > 0.0 && *s <= MAX_SECONDS)
        .ok_or_else(|| {
            format!(
                "Invalid duration: {} (expected seconds in (0, {}])",
                value, MAX_SECONDS
            )
        })
}

/// Surface shared with the monitor so the main loop can print it
struct SharedSurface(Rc<RefCell<AsciiSurface>>);

impl DrawingSurface for SharedSurface {
    fn width(&self) -> u32 {
        self.0.borrow().width()
    }

    fn height(&self) -> u32 {
        self.0.borrow().height()
    }

    fn clear(&mut self) {
        self.0.borrow_mut().clear();
    }

    fn begin_path(&mut self) {
        self.0.borrow_mut().begin_path();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.0.borrow_mut().move_to(x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.0.borrow_mut().line_to(x, y);
    }

    fn stroke(&mut self) {
        self.0.borrow_mut().stroke();
    }
}

/// Log-spaced sweep from MIN to MAX frequency and back over `progress` in [0, 1]
fn sweep_frequency(progress: f64) -> f32 {
    let triangle = 1.0 - (2.0 * progress - 1.0).abs();
    let (lo, hi) = (MIN_FREQUENCY_HZ as f64, MAX_FREQUENCY_HZ as f64);
    ((lo * (hi / lo).powf(triangle)) as f32).clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ)
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: tonescope [--list-devices] [--waveform <name>] [--seconds <n>]");
            std::process::exit(2);
        }
    };

    let settings = match Settings::load_default() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            Settings::default()
        }
    };
    init_logging(settings.log_to_file);

    if args.list_devices {
        match list_output_devices() {
            Ok(devices) => {
                for device in devices {
                    let marker = if device.is_default { " (default)" } else { "" };
                    println!("{}{}", device.name, marker);
                }
            }
            Err(e) => {
                log::error!("{}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = run(&args, &settings) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let device = Rc::new(CpalDevice::open(
        settings.output_device.as_deref(),
        &settings.audio,
    )?);
    let frames = Rc::new(FrameLoop::new());

    let mut osc = settings.tone.oscillator();
    if let Some(waveform) = args.waveform {
        osc.waveform = waveform;
    }
    let mut tone =
        ToneGenerator::with_config(device.clone(), frames.clone(), osc, settings.tone.gain());

    let screen = Rc::new(RefCell::new(AsciiSurface::new(SCREEN_WIDTH, SCREEN_HEIGHT)));
    tone.attach_visualizer(Box::new(SharedSurface(Rc::clone(&screen))));
    tone.start()?;

    let total = Duration::from_secs_f64(args.seconds);
    let total_frames = (args.seconds * settings.refresh_rate_hz as f64).max(1.0);
    let mut frame = SampleFrame::new();
    let mut sweep_error = None;

    frames.run_for(total, settings.refresh_rate_hz, |n| {
        let hz = sweep_frequency(n as f64 / total_frames);
        if let Err(e) = tone.set_frequency(hz) {
            sweep_error = Some(e);
            return false;
        }
        if n % PRINT_INTERVAL == 0 {
            let peak = match tone.read_frame(&mut frame) {
                Ok(()) => frame.peak(),
                Err(_) => 0.0,
            };
            print!("\x1b[2J\x1b[H{}", screen.borrow().render());
            println!(
                "{:>7.1} Hz  {}  peak {:.2}{}",
                hz,
                tone.oscillator().waveform,
                peak,
                if device.take_clipping() { "  CLIP" } else { "" }
            );
        }
        true
    });

    log::info!("Rendered {} monitor frames", tone.monitor_ticks());
    tone.stop()?;
    match sweep_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
