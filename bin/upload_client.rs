//! Upload a file three times as `files[]` along with a few text fields, the way the
//! actix-web multipart example expects, and check that the server answers `201 Created`.
//!
//! Configured through the environment: `UPLOAD_FILE` (default `test.png`), `UPLOAD_URL`,
//! `UPLOAD_TIMEOUT_SECS` and `UPLOAD_EXPECTED_STATUS`.
#[macro_use]
extern crate log;

use std::env;
use std::process::ExitCode;

use multipart_upload::client::hyper::Upload;
use multipart_upload::client::Form;
use multipart_upload::{ClientConfig, Result};

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("multipart_upload=info,upload_client=info"),
    )
    .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = ClientConfig::from_env()?;
    let file_name = env::var("UPLOAD_FILE").unwrap_or_else(|_| "test.png".to_string());

    let mut form = Form::new();
    form.quote_fields(false)
        .add_file_as("files[]", &file_name, "image1.png")
        .add_file_as("files[]", &file_name, "image2.png")
        .add_file_as("files[]", &file_name, "image3.png")
        .add_text("Hey", "hi")
        .add_text("Hi[One]", "1")
        .add_text("Hi[Two]", "2.0");

    info!("uploading {} to {}", file_name, config.url);

    let mut upload = Upload::new(&config, form)?;
    let response = upload.send().await?;

    println!("{}", response.body);

    upload.validate(&response)?;

    info!("upload finished with {}", response.status);
    Ok(())
}
