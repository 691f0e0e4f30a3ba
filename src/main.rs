mod entrypoints;
mod settings;

fn main() -> std::process::ExitCode {
    entrypoints::native_main()
}
