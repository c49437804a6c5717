use shardci::{ExitStatus, shardci_main};

fn main() -> ExitStatus {
    shardci_main(|args| args)
}
