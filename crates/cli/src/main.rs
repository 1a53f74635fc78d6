fn main() {
    if let Err(error) = fieldsearch_cli::run() {
        // run() installs the subscriber right after parsing arguments
        tracing::error!("CLI execution failed: {error:#}");
        std::process::exit(1);
    }
}
