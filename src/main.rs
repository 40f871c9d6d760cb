use std::process::ExitCode;

mod app;
mod cli;
mod conditions;
mod config;
mod control;
mod descriptor;
mod doctor;
mod driver;
mod logger;
mod report;
mod retry;
mod shell;
mod transfer;
mod types;


fn main() -> ExitCode {
    app::main()
}
