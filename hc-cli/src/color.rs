//! Overlay colour parsing for `--overlay-color`.

/// Parse `#RRGGBB`, `#RRGGBBAA`, `rgb(r, g, b[, a])` or `r,g,b[,a]` into RGBA.
pub fn parse_overlay_color(raw: &str) -> Result<[u8; 4], String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("overlay color value is empty".to_string());
    }

    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| format!("invalid hex color '{trimmed}'"));
    }

    let inner = match parse_fn_args(trimmed, "rgb").or_else(|| parse_fn_args(trimmed, "rgba")) {
        Some(inner) => inner,
        None => trimmed,
    };
    let parts: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if !(3..=4).contains(&parts.len()) {
        return Err(format!(
            "unrecognized overlay color '{trimmed}'; expected #RRGGBB, rgb(), or r,g,b"
        ));
    }

    let mut rgba = [0, 0, 0, 255];
    for (slot, token) in rgba.iter_mut().zip(&parts) {
        *slot = token
            .parse::<u8>()
            .map_err(|_| format!("color component '{token}' must be between 0 and 255"))?;
    }
    Ok(rgba)
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
    Some([byte(0)?, byte(2)?, byte(4)?, alpha])
}

fn parse_fn_args<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    let open = input.find('(')?;
    let close = input.rfind(')')?;
    if close <= open || !input[..open].trim().eq_ignore_ascii_case(name) {
        return None;
    }
    Some(&input[open + 1..close])
}
