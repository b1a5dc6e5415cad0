use crate::error::{AdError, Result};
use crate::models::{AdCreative, MediaRendition, VerificationResource};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::str::from_utf8;
use url::Url;

/// Parse a VAST XML string into an ad creative.
///
/// Never fails: malformed XML, a missing root, or an unexpected document
/// shape degrade to an empty creative, logged but not surfaced. Unparsable
/// URLs are dropped individually without failing the rest of the document.
pub fn parse(xml: &str) -> AdCreative {
    match parse_document(xml) {
        Ok(creative) => creative,
        Err(e) => {
            log::warn!("VAST parse failed, degrading to empty creative: {e}");
            AdCreative::empty()
        }
    }
}

fn parse_document(xml: &str) -> Result<AdCreative> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut creative = AdCreative::empty();
    let mut saw_root = false;

    // Single pass over the document. Elements of interest are matched by
    // name wherever they occur; everything else is descended through and
    // ignored, so unrecognized VAST versions and extensions parse cleanly.
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if !saw_root {
                    if e.name().as_ref() != b"VAST" {
                        return Err(AdError::Other("document root is not VAST".to_string()));
                    }
                    saw_root = true;
                } else {
                    match e.name().as_ref() {
                        b"MediaFiles" => parse_media_files(&mut reader, &mut creative)?,
                        b"TrackingEvents" => {
                            let events = parse_tracking_events(&mut reader)?;
                            creative.tracking_events.extend(events);
                        }
                        b"AdVerifications" => {
                            let verification = parse_verifications(&mut reader)?;
                            if creative.verification.is_none() {
                                creative.verification = verification;
                            }
                        }
                        b"Duration" => {
                            let label = read_text_element(&mut reader)?;
                            if creative.duration_label.is_none() && !label.is_empty() {
                                creative.duration_label = Some(label);
                            }
                        }
                        b"Impression" => {
                            let text = read_text_element(&mut reader)?;
                            push_url(&mut creative.impression_urls, &text, "impression");
                        }
                        b"Error" => {
                            let text = read_text_element(&mut reader)?;
                            push_url(&mut creative.error_urls, &text, "error");
                        }
                        b"ClickTracking" => {
                            let text = read_text_element(&mut reader)?;
                            push_url(&mut creative.click_tracking_urls, &text, "click tracking");
                        }
                        b"ClickThrough" => {
                            let text = read_text_element(&mut reader)?;
                            if creative.click_through_url.is_none() {
                                creative.click_through_url = parse_url(&text, "click-through");
                            }
                        }
                        _ => (),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    if !saw_root {
        return Err(AdError::Other("no VAST root element found".to_string()));
    }

    Ok(creative)
}

/// Parse a MediaFiles element: renditions plus any closed caption files
fn parse_media_files(reader: &mut Reader<&[u8]>, creative: &mut AdCreative) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"MediaFile" => {
                    if let Some(rendition) = parse_media_file(reader, e)? {
                        creative.media_renditions.push(rendition);
                    }
                }
                b"ClosedCaptionFile" => {
                    let text = read_text_element(reader)?;
                    if creative.closed_caption_url.is_none() {
                        creative.closed_caption_url = parse_url(&text, "closed caption");
                    }
                }
                _ => (),
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"MediaFiles" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

/// Parse a MediaFile element. Returns None when the URL doesn't resolve —
/// the rendition is dropped, the rest of the document is unaffected.
fn parse_media_file(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
) -> Result<Option<MediaRendition>> {
    let mut width = None;
    let mut height = None;
    let mut mime_type = None;

    for attr in start.attributes().flatten() {
        match attr.key.as_ref() {
            b"width" => {
                if let Ok(value) = from_utf8(&attr.value) {
                    width = value.parse::<u32>().ok();
                }
            }
            b"height" => {
                if let Ok(value) = from_utf8(&attr.value) {
                    height = value.parse::<u32>().ok();
                }
            }
            b"type" => {
                if let Ok(value) = from_utf8(&attr.value) {
                    mime_type = Some(value.to_string());
                }
            }
            _ => (),
        }
    }

    let text = read_text_element(reader)?;
    Ok(parse_url(&text, "media file").map(|url| MediaRendition {
        url,
        width,
        height,
        mime_type,
        caption_url: None,
    }))
}

/// Parse a TrackingEvents element into an event-name → URL map. Elements
/// missing the event attribute or a resolvable URL are skipped; repeated
/// event names keep the last occurrence.
fn parse_tracking_events(reader: &mut Reader<&[u8]>) -> Result<HashMap<String, Url>> {
    let mut events = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Tracking" => {
                let name = tracking_event_name(e);
                let text = read_text_element(reader)?;
                match (name, parse_url(&text, "tracking")) {
                    (Some(name), Some(url)) => {
                        events.insert(name, url);
                    }
                    (None, _) => log::debug!("Skipping Tracking element without event attribute"),
                    _ => (),
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"TrackingEvents" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(events)
}

fn tracking_event_name(start: &BytesStart) -> Option<String> {
    for attr in start.attributes().flatten() {
        if attr.key.as_ref() == b"event" {
            if let Ok(value) = from_utf8(&attr.value) {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Parse an AdVerifications element. The first Verification with a
/// resolvable script URL wins; entries without one are skipped entirely.
fn parse_verifications(reader: &mut Reader<&[u8]>) -> Result<Option<VerificationResource>> {
    let mut resource = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Verification" => {
                let vendor_key = verification_vendor(e);
                let parsed = parse_verification(reader, vendor_key)?;
                if resource.is_none() {
                    resource = parsed;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"AdVerifications" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(resource)
}

fn verification_vendor(start: &BytesStart) -> Option<String> {
    for attr in start.attributes().flatten() {
        if attr.key.as_ref() == b"vendor" {
            if let Ok(value) = from_utf8(&attr.value) {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn parse_verification(
    reader: &mut Reader<&[u8]>,
    vendor_key: Option<String>,
) -> Result<Option<VerificationResource>> {
    let mut script_url = None;
    let mut parameters = None;
    let mut tracking_events = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"JavaScriptResource" => {
                    let text = read_text_element(reader)?;
                    if script_url.is_none() {
                        script_url = parse_url(&text, "verification script");
                    }
                }
                b"VerificationParameters" => {
                    let text = read_text_element(reader)?;
                    if !text.is_empty() {
                        parameters = Some(text);
                    }
                }
                b"TrackingEvents" => {
                    tracking_events = parse_tracking_events(reader)?;
                }
                _ => (),
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Verification" => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(script_url.map(|script_url| VerificationResource {
        vendor_key,
        script_url,
        parameters,
        tracking_events,
    }))
}

/// Helper function to read the text content of an XML element
fn read_text_element(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                text = e.unescape()?.into_owned();
            }
            Ok(Event::CData(e)) => {
                if let Ok(value) = from_utf8(&e) {
                    text = value.to_string();
                }
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => {
                return Err(AdError::Other("Unexpected end of file".to_string()));
            }
            Err(e) => return Err(AdError::XmlParse(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

/// Parse a URL, dropping it with a log line when it doesn't resolve
fn parse_url(raw: &str, what: &str) -> Option<Url> {
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            log::warn!("Dropping unparsable {what} URL {raw:?}: {e}");
            None
        }
    }
}

fn push_url(target: &mut Vec<Url>, raw: &str, what: &str) {
    if let Some(url) = parse_url(raw, what) {
        target.push(url);
    }
}
