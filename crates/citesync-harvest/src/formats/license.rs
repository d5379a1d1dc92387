/// License URLs, beyond Creative Commons, under which publishers make the
/// full text freely available.
const OPEN_ACCESS_LICENSES: [&str; 6] = [
    "http://koreanjpathol.org/authors/access.php",
    "http://olabout.wiley.com/WileyCDA/Section/id-815641.html",
    "http://pubs.acs.org/page/policy/authorchoice_ccby_termsofuse.html",
    "http://pubs.acs.org/page/policy/authorchoice_ccbyncnd_termsofuse.html",
    "http://pubs.acs.org/page/policy/authorchoice_termsofuse.html",
    "http://www.elsevier.com/open-access/userlicense/1.0/",
];

/// Whether a work under `license_url` is expected to be free to read at the publisher.
pub fn is_open_access_license(license_url: &str) -> bool {
    license_url.contains("creativecommons.org/licenses/")
        || OPEN_ACCESS_LICENSES.contains(&license_url)
}

pub fn any_open_access<'a>(licenses: impl IntoIterator<Item = &'a String>) -> bool {
    licenses.into_iter().any(|url| is_open_access_license(url))
}
