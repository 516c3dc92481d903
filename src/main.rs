fn main() -> std::process::ExitCode {
    life_os_lib::run()
}
