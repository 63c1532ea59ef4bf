fn main() -> anyhow::Result<()> {
    sleeptrack_lib::run()
}
