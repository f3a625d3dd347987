use std::io::Write as _;

use studio_harness::prelude::*;
use studio_harness::vendors::dashscope::DashScopeProvider;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StudioError> {
    let provider = DashScopeProvider::from_env()?;
    let mut session = ChatSession::new().system_instruction("You are a concise creative assistant.");

    for prompt in ["Suggest a name for a synthwave band.", "Now a tagline for it."] {
        println!("> {prompt}");
        let mut printed = 0;
        session
            .send_with(&provider, prompt, |msg| {
                match msg.text.get(printed..) {
                    Some(rest) => print!("{rest}"),
                    None => print!("\n{}", msg.text),
                }
                printed = msg.text.len();
                let _ = std::io::stdout().flush();
            })
            .await?;
        println!();
    }
    Ok(())
}
