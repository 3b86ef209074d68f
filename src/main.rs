fn main() -> std::process::ExitCode {
    seeclick_lib::run()
}
