// ABOUTME: Terminal rendering of pairing challenges as scannable QR codes
// ABOUTME: Uses half-block unicode so the code fits in a normal console

use anyhow::Result;
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;

/// Render `code` as a block of unicode half-blocks, inverted for dark terminals.
pub fn render(code: &str) -> Result<String> {
    let qr = QrCode::new(code.as_bytes())
        .map_err(|e| anyhow::anyhow!("Failed to encode pairing code: {e:?}"))?;
    Ok(qr
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Print the pairing code to stdout for the operator to scan.
pub fn print(code: &str) {
    match render(code) {
        Ok(art) => println!("\nScan this code with WhatsApp (Linked devices):\n{art}\n"),
        Err(e) => tracing::warn!(error = %e, "Could not render pairing code"),
    }
}
