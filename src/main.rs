fn main() -> anyhow::Result<()> {
    bpreader_lib::run()
}
