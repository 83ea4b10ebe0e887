//! List all paired Wii Remotes.

fn main() {
    env_logger::init();

    match wiimouse::list_remotes() {
        Ok(remotes) => {
            println!("Found {} remote(s):", remotes.len());
            for (i, remote) in remotes.iter().enumerate() {
                println!(
                    "  [{}] pid=0x{:04x}  serial={}  path={}",
                    i, remote.product_id, remote.serial, remote.path
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
