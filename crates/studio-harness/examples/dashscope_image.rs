use base64::Engine as _;
use studio_harness::prelude::*;
use studio_harness::vendors::dashscope::{DashScopeImages, DashScopeProvider, ImageRequest};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StudioError> {
    let images = DashScopeImages::new(DashScopeProvider::from_env()?);
    let poller = Poller::new(images.clone(), PollPolicy::image());

    let job = poller
        .submit(&ImageRequest::new(
            "a lighthouse at dusk, oil painting",
            AspectRatio::parse("16:9"),
        ))
        .await?;
    println!("submitted {}", job.handle.id);

    let task = poller.spawn(job);
    let abort = task.abort_handle();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        abort.abort();
    });

    let artifact = task.wait().await?;
    let bytes = images.download(&artifact).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    println!("image: {} bytes ({} base64 chars)", bytes.len(), encoded.len());
    Ok(())
}
