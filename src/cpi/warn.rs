fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

#[allow(clippy::too_many_arguments)]
pub fn format_line(
    code: &str,
    stage: &str,
    action: &str,
    series: &str,
    window: &str,
    retry: &str,
    reason: &str,
    err: &str,
) -> String {
    format!(
        "CPI_WARN code={} stage={} action={} series={} window={} retry={} reason={} err={}",
        sanitize_value(code),
        sanitize_value(stage),
        sanitize_value(action),
        sanitize_value(series),
        sanitize_value(window),
        sanitize_value(retry),
        sanitize_value(reason),
        sanitize_value(err),
    )
}

/// One grep-able `key=value` warning line through the `log` facade.
#[allow(clippy::too_many_arguments)]
pub fn emit(
    code: &str,
    stage: &str,
    action: &str,
    series: &str,
    window: &str,
    retry: &str,
    reason: &str,
    err: &str,
) {
    log::warn!(
        "{}",
        format_line(code, stage, action, series, window, retry, reason, err)
    );
}
