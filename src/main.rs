fn main() -> std::process::ExitCode {
    apple_status_rss_lib::run()
}
