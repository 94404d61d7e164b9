fn main() -> std::process::ExitCode {
    retractobot_lib::run()
}
