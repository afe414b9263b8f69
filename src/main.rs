fn main() {
    if let Err(err) = meteo_uplink::app::run() {
        eprintln!("hourly uplink failed: {err}");
        std::process::exit(1);
    }
}
