fn main() -> anyhow::Result<()> {
    excel_bench::cli::run()
}
