/// URL slug: lowercase ASCII alphanumerics separated by single hyphens.
///
/// `"Hello World"` becomes `"hello-world"`; `"Cardiology & ECG (2024)"` becomes `"cardiology-ecg-2024"`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '\'' {
            continue;
        } else {
            pending_dash = true;
        }
    }

    slug
}
