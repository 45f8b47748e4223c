#![allow(dead_code)]

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// 1x1 PNG.
pub static COVER_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

pub static FRONT_JPG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const CH1_XHTML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Chapter 1</title></head>
<body><h1 id="top">Chapter 1</h1><p>Winter.</p><h2 id="s1">Section 1.1</h2></body></html>"#;

pub const CH2_XHTML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Chapter 2</title></head>
<body><h1>Chapter 2</h1></body></html>"#;

/// Writes an EPUB with `mimetype` stored first and the remaining files deflated.
#[derive(Debug, Default)]
pub struct EpubBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    pub fn new() -> Self {
        Self::default().file("META-INF/container.xml", CONTAINER_XML)
    }

    pub fn file(mut self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files.push((name.to_owned(), contents.as_ref().to_vec()));
        self
    }

    pub fn opf(self, metadata: &str, manifest: &str, spine_attrs: &str) -> Self {
        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
{metadata}
  </metadata>
  <manifest>
{manifest}
  </manifest>
  <spine{spine_attrs}><itemref idref="ch1"/></spine>
</package>"#
        );
        self.file("OEBPS/content.opf", opf)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut zip = zip::ZipWriter::new(file);

        zip.start_file(
            "mimetype",
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        )?;
        zip.write_all(b"application/epub+zip")?;

        for (name, contents) in &self.files {
            zip.start_file(
                name.as_str(),
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            )?;
            zip.write_all(contents)?;
        }
        zip.finish()?;
        Ok(())
    }
}

/// EPUB 3: nav document, cover-image property, uuid identifier, markup in
/// the description.
pub fn epub3() -> EpubBuilder {
    EpubBuilder::new()
        .opf(
            r#"    <dc:title>The Left Hand of Darkness</dc:title>
    <dc:creator>Ursula K. Le Guin</dc:creator>
    <dc:identifier id="bookid">urn:uuid:6b1a6a0c-8b0e-4b7e-9d2a-1f2e3d4c5b6a</dc:identifier>
    <dc:publisher>Ace Books</dc:publisher>
    <dc:date>1969-03-01</dc:date>
    <dc:description>&lt;p&gt;A   novel about &lt;em&gt;Gethen&lt;/em&gt;.&lt;/p&gt;</dc:description>"#,
            r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="cover" href="images/cover.png" media-type="image/png" properties="cover-image"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>"#,
            "",
        )
        .file(
            "OEBPS/nav.xhtml",
            r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="toc">
    <ol>
      <li><a href="text/ch1.xhtml">Chapter 1</a>
        <ol><li><a href="text/ch1.xhtml#s1">Section 1.1</a></li></ol>
      </li>
      <li><a href="text/ch2.xhtml">Chapter 2</a></li>
    </ol>
  </nav>
</body>
</html>"#,
        )
        .file("OEBPS/images/cover.png", COVER_PNG)
        .file("OEBPS/text/ch1.xhtml", CH1_XHTML)
        .file("OEBPS/text/ch2.xhtml", CH2_XHTML)
}

/// EPUB 2: NCX navigation, `<meta name="cover">`, an "Unknown" author and a
/// null publish date.
pub fn epub2() -> EpubBuilder {
    EpubBuilder::new()
        .opf(
            r#"    <dc:title>Old Format</dc:title>
    <dc:creator>Unknown</dc:creator>
    <dc:identifier id="bookid">urn:isbn:9780441478125</dc:identifier>
    <dc:date>0101-01-01T00:00:00+00:00</dc:date>
    <meta name="cover" content="front"/>"#,
            r#"    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="front" href="images/front.jpg" media-type="image/jpeg"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>"#,
            r#" toc="ncx""#,
        )
        .file(
            "OEBPS/toc.ncx",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Opening</text></navLabel>
      <content src="text/ch1.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#,
        )
        .file("OEBPS/images/front.jpg", FRONT_JPG)
        .file("OEBPS/text/ch1.xhtml", CH1_XHTML)
}

/// Cover only reachable through the `<img>` in the first TOC document.
pub fn epub_with_inline_cover() -> EpubBuilder {
    EpubBuilder::new()
        .opf(
            "    <dc:title>Inline Cover</dc:title>",
            r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="title" href="text/title.xhtml" media-type="application/xhtml+xml"/>
    <item id="img1" href="images/front.jpg" media-type="image/jpeg"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>"#,
            "",
        )
        .file(
            "OEBPS/nav.xhtml",
            r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="toc"><ol>
  <li><a href="text/title.xhtml">Title Page</a></li>
  <li><a href="text/ch1.xhtml">Chapter 1</a></li>
</ol></nav></body></html>"#,
        )
        .file(
            "OEBPS/text/title.xhtml",
            r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><div><img alt="" src="../images/front.jpg"/></div></body></html>"#,
        )
        .file("OEBPS/images/front.jpg", FRONT_JPG)
        .file("OEBPS/text/ch1.xhtml", CH1_XHTML)
}

/// A valid package with neither a nav document nor an NCX.
pub fn epub_without_navigation() -> EpubBuilder {
    EpubBuilder::new().opf(
        "    <dc:title>No Navigation</dc:title>",
        r#"    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>"#,
        "",
    )
}

pub fn write_garbage(path: &Path) -> anyhow::Result<()> {
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    file.write_all(b"this is not a zip archive")?;
    Ok(())
}

/// Manifest items written as `<item ...></item>` instead of self-closing.
pub fn epub_long_form_manifest() -> EpubBuilder {
    EpubBuilder::new()
        .opf(
            r#"    <dc:title>Real Title</dc:title>
    <dc:creator>Real Author</dc:creator>"#,
            r#"    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"></item>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"></item>"#,
            r#" toc="ncx""#,
        )
        .file(
            "OEBPS/toc.ncx",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Only Chapter</text></navLabel>
      <content src="text/ch1.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#,
        )
        .file("OEBPS/text/ch1.xhtml", CH1_XHTML)
}

/// A nav href that percent-encodes a space stored unencoded in the zip.
pub fn epub_with_encoded_href() -> EpubBuilder {
    EpubBuilder::new()
        .opf(
            "    <dc:title>Encoded Names</dc:title>",
            r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ch1" href="text/chapter%20one.xhtml" media-type="application/xhtml+xml"/>"#,
            "",
        )
        .file(
            "OEBPS/nav.xhtml",
            r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="toc"><ol><li><a href="text/chapter%20one.xhtml">Chapter One</a></li></ol></nav>
</body></html>"#,
        )
        .file("OEBPS/text/chapter one.xhtml", CH1_XHTML)
}
