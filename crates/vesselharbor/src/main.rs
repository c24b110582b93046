use std::process::ExitCode;

fn main() -> ExitCode {
    vesselharbor_lib::main().into()
}
