use std::process::ExitCode;

fn main() -> ExitCode {
    timeit_compare_e2e_tests::main()
}
