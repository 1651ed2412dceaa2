fn main() -> anyhow::Result<()> {
    deadline_hub::cli::run()
}
