use std::{error::Error, path::Path};

use log::info;

use repofetch::Repofetch;

/// Handler to fetch command
pub fn do_fetch(
    repofetch: &Repofetch,
    source: &str,
    reference: Option<&str>,
    output_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let fetched = repofetch.fetch(source, reference, output_dir, |line| println!("{line}"))?;
    match fetched.content_id {
        Some(content_id) => info!(
            "Fetched with the {} provider, content id {}",
            fetched.provider, content_id
        ),
        None => info!("Fetched with the {} provider", fetched.provider),
    }
    Ok(())
}

/// Handler to detect command
pub fn do_detect(
    repofetch: &Repofetch,
    source: &str,
    reference: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let (provider, spec) = repofetch.detect(source, reference)?;
    println!("{provider}");
    info!("{} understood {} as {:?}", provider, source, spec);
    Ok(())
}
