//! Launch Chrome, load a page and print its metrics and links
//!
//! ```text
//! cargo run -p browser --example page_metrics -- https://example.com/
//! ```

use browser::{Browser, Launcher, NavigateOptions, Page, PageEvent, WaitUntil};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com/".to_string());
    let chrome = std::env::var("CHROME_EXE").unwrap_or_else(|_| "/usr/bin/google-chrome".into());

    Launcher::new()
        .use_binary(chrome)
        .use_temp_profile()
        .run(|browser| async move {
            let page = browser.new_page().await?;
            let mut events = page.subscribe();

            page.goto(&url, NavigateOptions::new(WaitUntil::Load)).await?;
            println!("Loaded {}", page.url().await?);

            while let Ok(event) = events.try_recv() {
                if let PageEvent::PageError { message } = event {
                    println!("Page error: {}", message);
                }
            }

            for (name, value) in page.metrics().await?.0 {
                println!("{:>28} {}", name, value);
            }

            let hrefs = page
                .evaluate("Array.from(document.querySelectorAll('a'), a => a.href)")
                .await?;
            println!("Links: {}", hrefs);

            page.close().await?;
            Ok::<(), browser::BrowserError>(())
        })
        .await??;

    Ok(())
}
