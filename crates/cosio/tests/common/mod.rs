//! In-memory object service speaking enough of the COS protocol for the
//! transfer engine: objects, ranged reads, multipart sessions with paginated
//! listings, part copies, fault injection and a journal of every request.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use cosio::{
    CosClient, CosConfig, CosResponse, Fingerprint, FingerprintKind, HEADER_COPY_SOURCE, HEADER_COPY_SOURCE_RANGE,
    HEADER_CRC64, HEADER_REQUEST_ID, HttpRequest, KIB, Method, RequestBody, Transport,
};
use serde::Deserialize;

pub const APP_ID: u64 = 1250000000;
pub const REGION: &str = "ap-guangzhou";
pub const BUCKET: &str = "media";

/// Small sizes so a few KiB exercise several parts and waves.
pub fn config() -> CosConfig {
    CosConfig {
        app_id: APP_ID,
        retry_interval_ms: 0,
        upload_part_size: 4 * KIB,
        upload_copy_part_size: 4 * KIB,
        download_slice_size: 4 * KIB,
        upload_pool_size: 2,
        download_pool_size: 2,
        ..CosConfig::new("AKIDmock", "secret", REGION)
    }
}

pub fn client(mock: &MockCos, config: CosConfig) -> CosClient<MockCos> {
    CosClient::new(config, mock.clone()).unwrap()
}

pub fn host(bucket: &str) -> String { cosio::default_host(APP_ID, REGION, bucket) }

/// Deterministic, non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8).collect()
}

pub fn md5_hex(data: &[u8]) -> String { Fingerprint::compute(FingerprintKind::Md5, data).to_string() }

pub fn crc64(data: &[u8]) -> String { Fingerprint::compute(FingerprintKind::Crc64, data).to_string() }

/// One request as the service saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method:  Method,
    /// Request URL as sent, before backup-domain folding.
    pub url:     String,
    pub host:    String,
    pub path:    String,
    pub params:  BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl Call {
    pub fn is_part_upload(&self) -> bool {
        self.method == Method::Put && self.params.contains_key("partNumber") && !self.has_header(HEADER_COPY_SOURCE)
    }

    pub fn is_part_copy(&self) -> bool {
        self.method == Method::Put && self.params.contains_key("partNumber") && self.has_header(HEADER_COPY_SOURCE)
    }

    pub fn part_number(&self) -> Option<u32> { self.params.get("partNumber").and_then(|n| n.parse().ok()) }

    pub fn is_initiate(&self) -> bool { self.method == Method::Post && self.params.contains_key("uploads") }

    pub fn is_complete(&self) -> bool { self.method == Method::Post && self.params.contains_key("uploadId") }

    pub fn is_abort(&self) -> bool { self.method == Method::Delete && self.params.contains_key("uploadId") }

    pub fn is_put_object(&self) -> bool { self.method == Method::Put && self.params.is_empty() }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn has_header(&self, name: &str) -> bool { self.header(name).is_some() }
}

pub fn part(number: u32) -> impl Fn(&Call) -> bool + Send + Sync + 'static {
    move |call| call.is_part_upload() && call.part_number() == Some(number)
}

pub fn completion() -> impl Fn(&Call) -> bool + Send + Sync + 'static { |call: &Call| call.is_complete() }

pub fn any_request() -> impl Fn(&Call) -> bool + Send + Sync + 'static { |_: &Call| true }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Answer with this status and an error document. 4xx answers carry a request id.
    Status(u16),
    /// Drop the connection without an answer.
    Reset,
    /// Process the request but report a wrong CRC64 and ETag.
    BadChecksum,
    /// Answer 200 with an error document and no request id.
    ErrorBody,
}

struct Rule {
    matcher:   Box<dyn Fn(&Call) -> bool + Send + Sync>,
    fault:     Fault,
    remaining: usize,
}

#[derive(Debug, Clone)]
struct Session {
    host:      String,
    key:       String,
    sequence:  u32,
    parts:     BTreeMap<u32, Bytes>,
}

#[derive(Default)]
struct State {
    objects:         BTreeMap<String, Bytes>,
    sessions:        BTreeMap<String, Session>,
    rules:           Vec<Rule>,
    journal:         Vec<Call>,
    sequence:        u32,
    part_page_size:  usize,
    upload_page_size: usize,
    corrupt_head_crc: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("connection reset by mock")]
pub struct MockReset;

/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct MockCos {
    state:   Arc<Mutex<State>>,
    latency: Option<Duration>,
}

impl Default for MockCos {
    fn default() -> Self { Self::new() }
}

fn object_id(host: &str, key: &str) -> String { format!("{host}/{key}") }

impl MockCos {
    pub fn new() -> Self {
        let state = State { part_page_size: 1000, upload_page_size: 1000, ..State::default() };
        Self { state: Arc::new(Mutex::new(state)), latency: None }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_part_page_size(&self, size: usize) { self.state.lock().unwrap().part_page_size = size; }

    pub fn set_upload_page_size(&self, size: usize) { self.state.lock().unwrap().upload_page_size = size; }

    /// Report a wrong CRC64 on HEAD.
    pub fn corrupt_head_crc(&self) { self.state.lock().unwrap().corrupt_head_crc = true; }

    /// Apply `fault` to the next `times` requests `matcher` accepts.
    pub fn inject(&self, matcher: impl Fn(&Call) -> bool + Send + Sync + 'static, fault: Fault, times: usize) {
        self.state.lock().unwrap().rules.push(Rule { matcher: Box::new(matcher), fault, remaining: times });
    }

    pub fn put(&self, host: &str, key: &str, data: impl Into<Bytes>) {
        self.state.lock().unwrap().objects.insert(object_id(host, key), data.into());
    }

    pub fn object(&self, host: &str, key: &str) -> Option<Bytes> {
        self.state.lock().unwrap().objects.get(&object_id(host, key)).cloned()
    }

    pub fn calls(&self) -> Vec<Call> { self.state.lock().unwrap().journal.clone() }

    pub fn count(&self, filter: impl Fn(&Call) -> bool) -> usize { self.calls().iter().filter(|c| filter(c)).count() }

    /// Part numbers of every part upload attempt, in arrival order.
    pub fn uploaded_parts(&self) -> Vec<u32> {
        self.calls().iter().filter(|c| c.is_part_upload()).filter_map(Call::part_number).collect()
    }

    pub fn clear_journal(&self) { self.state.lock().unwrap().journal.clear(); }

    pub fn session_ids(&self) -> Vec<String> { self.state.lock().unwrap().sessions.keys().cloned().collect() }

    pub fn session_parts(&self, upload_id: &str) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        state.sessions.get(upload_id).map(|s| s.parts.keys().copied().collect()).unwrap_or_default()
    }

    fn handle(&self, request: &HttpRequest) -> Result<CosResponse, MockReset> {
        let (host, path) = split_url(&request.url);
        let call = Call {
            method: request.method,
            url: request.url.clone(),
            host: host.clone(),
            path: path.clone(),
            params: request.params.clone(),
            headers: request.headers.clone(),
        };

        let mut state = self.state.lock().unwrap();
        state.journal.push(call.clone());
        assert!(
            call.header("Authorization").is_some_and(|a| a.starts_with("q-sign-algorithm=sha1&")),
            "unsigned request {call:?}"
        );

        let fault = state.rules.iter_mut().find(|r| r.remaining > 0 && (r.matcher)(&call)).map(|rule| {
            rule.remaining -= 1;
            rule.fault
        });
        let rid = format!("mock-rid-{}", state.journal.len());
        match fault {
            Some(Fault::Status(status)) => {
                let rid = (status < 500).then_some(rid.as_str());
                return Ok(error(status, "InjectedFault", rid));
            }
            Some(Fault::Reset) => return Err(MockReset),
            Some(Fault::ErrorBody) => return Ok(error(200, "InternalError", None)),
            Some(Fault::BadChecksum) | None => {}
        }

        let body = body_bytes(&request.body);
        let mut response = state.serve(&call, body);
        response.headers.insert(HEADER_REQUEST_ID.into(), rid);
        if fault == Some(Fault::BadChecksum) {
            response.headers.insert(HEADER_CRC64.into(), "1".into());
            response.headers.insert("etag".into(), "\"00000000000000000000000000000000\"".into());
        }
        Ok(response)
    }
}

impl Transport for MockCos {
    type Error = MockReset;

    async fn send(&self, request: HttpRequest) -> Result<CosResponse, MockReset> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.handle(&request)
    }
}

impl State {
    fn serve(&mut self, call: &Call, body: Bytes) -> CosResponse {
        let key = decode_key(&call.path);
        let id = object_id(&call.host, &key);
        let p = &call.params;

        match call.method {
            Method::Head => match self.objects.get(&id) {
                Some(data) => {
                    let mut response = object_headers(200, data);
                    if self.corrupt_head_crc {
                        response.headers.insert(HEADER_CRC64.into(), "42".into());
                    }
                    response
                }
                None => error(404, "NoSuchKey", Some("head")),
            },
            Method::Get if p.contains_key("uploads") => self.list_uploads(call),
            Method::Get if p.contains_key("uploadId") => self.list_parts(call),
            Method::Get => match self.objects.get(&id) {
                Some(data) => ranged_get(data, call.header("Range")),
                None => error(404, "NoSuchKey", Some("get")),
            },
            Method::Post if p.contains_key("uploads") => {
                self.sequence += 1;
                let upload_id = format!("mock-upload-{:04}", self.sequence);
                self.sessions.insert(upload_id.clone(), Session {
                    host: call.host.clone(),
                    key: key.clone(),
                    sequence: self.sequence,
                    parts: BTreeMap::new(),
                });
                xml_ok(format!(
                    "<InitiateMultipartUploadResult><Bucket>{}</Bucket><Key>{key}</Key><UploadId>{upload_id}</UploadId></InitiateMultipartUploadResult>",
                    call.host
                ))
            }
            Method::Post if p.contains_key("uploadId") => self.complete(&p["uploadId"], &id, &body),
            Method::Post => unreachable!("mock: POST without uploads/uploadId query"),
            Method::Put if p.contains_key("partNumber") => {
                if !self.sessions.contains_key(&p["uploadId"]) {
                    return error(404, "NoSuchUpload", Some("part"));
                }
                let number: u32 = p["partNumber"].parse().unwrap();
                match call.header(HEADER_COPY_SOURCE) {
                    Some(source) => {
                        let Some(data) = self.copy_source(source, call.header(HEADER_COPY_SOURCE_RANGE)) else {
                            return error(404, "NoSuchKey", Some("copy"));
                        };
                        let etag = md5_hex(&data);
                        self.sessions.get_mut(&p["uploadId"]).unwrap().parts.insert(number, data);
                        xml_ok(format!(
                            "<CopyPartResult><ETag>\"{etag}\"</ETag><LastModified>2026-01-01T00:00:00.000Z</LastModified></CopyPartResult>"
                        ))
                    }
                    None => {
                        let response = object_headers(200, &body);
                        self.sessions.get_mut(&p["uploadId"]).unwrap().parts.insert(number, body);
                        CosResponse { body: Bytes::new(), ..response }
                    }
                }
            }
            Method::Put => match call.header(HEADER_COPY_SOURCE) {
                Some(source) => {
                    let Some(data) = self.copy_source(source, None) else {
                        return error(404, "NoSuchKey", Some("copy"));
                    };
                    let (etag, crc) = (md5_hex(&data), crc64(&data));
                    self.objects.insert(id, data);
                    xml_ok(format!(
                        "<CopyObjectResult><ETag>\"{etag}\"</ETag><CRC64>{crc}</CRC64><LastModified>2026-01-01T00:00:00.000Z</LastModified></CopyObjectResult>"
                    ))
                }
                None => {
                    let response = object_headers(200, &body);
                    self.objects.insert(id, body);
                    CosResponse { body: Bytes::new(), ..response }
                }
            },
            Method::Delete if p.contains_key("uploadId") => match self.sessions.remove(&p["uploadId"]) {
                Some(_) => CosResponse { status: 204, ..CosResponse::default() },
                None => error(404, "NoSuchUpload", Some("abort")),
            },
            Method::Delete => {
                self.objects.remove(&id);
                CosResponse { status: 204, ..CosResponse::default() }
            }
        }
    }

    fn copy_source(&self, source: &str, range: Option<&str>) -> Option<Bytes> {
        let (host, path) = source.split_once('/')?;
        let data = self.objects.get(&object_id(host, &decode_key(&format!("/{path}"))))?;
        match range.and_then(parse_range) {
            Some((first, last)) => Some(data.slice(first as usize..=last as usize)),
            None => Some(data.clone()),
        }
    }

    fn complete(&mut self, upload_id: &str, id: &str, body: &[u8]) -> CosResponse {
        #[derive(Deserialize)]
        struct Part {
            #[serde(rename = "PartNumber")]
            number: u32,
            #[serde(rename = "ETag")]
            etag:   String,
        }
        #[derive(Deserialize)]
        struct Request {
            #[serde(rename = "Part", default)]
            parts: Vec<Part>,
        }

        let Some(session) = self.sessions.get(upload_id) else {
            return error(404, "NoSuchUpload", Some("complete"));
        };
        let request: Request = quick_xml::de::from_str(std::str::from_utf8(body).unwrap()).unwrap();
        if request.parts.is_empty() || !request.parts.windows(2).all(|w| w[0].number < w[1].number) {
            return error(400, "InvalidPartOrder", Some("complete"));
        }

        let mut assembled = Vec::new();
        for part in &request.parts {
            match session.parts.get(&part.number) {
                Some(data) if md5_hex(data) == part.etag.trim_matches('"') => assembled.extend_from_slice(data),
                _ => return error(400, "InvalidPart", Some("complete")),
            }
        }

        let (bucket, key) = (session.host.clone(), session.key.clone());
        let count = request.parts.len();
        let data = Bytes::from(assembled);
        let etag = format!("{}-{count}", md5_hex(&data));
        let crc = crc64(&data);
        self.sessions.remove(upload_id);
        self.objects.insert(id.to_string(), data);

        let mut response = xml_ok(format!(
            "<CompleteMultipartUploadResult><Location>{id}</Location><Bucket>{bucket}</Bucket><Key>{key}</Key><ETag>\"{etag}\"</ETag></CompleteMultipartUploadResult>"
        ));
        response.headers.insert(HEADER_CRC64.into(), crc);
        response
    }

    fn list_parts(&self, call: &Call) -> CosResponse {
        let Some(session) = self.sessions.get(&call.params["uploadId"]) else {
            return error(404, "NoSuchUpload", Some("list"));
        };
        let marker: u32 = call.params.get("part-number-marker").and_then(|m| m.parse().ok()).unwrap_or(0);
        let max: usize = call.params.get("max-parts").and_then(|m| m.parse().ok()).unwrap_or(1000);
        let page_size = max.min(self.part_page_size);

        let remaining: Vec<_> = session.parts.range(marker + 1..).collect();
        let page = &remaining[..remaining.len().min(page_size)];
        let truncated = remaining.len() > page.len();
        let next = page.last().map(|(n, _)| n.to_string()).unwrap_or_default();

        let mut xml = format!(
            "<ListPartsResult><Bucket>{}</Bucket><Key>{}</Key><UploadId>{}</UploadId><PartNumberMarker>{marker}</PartNumberMarker><NextPartNumberMarker>{next}</NextPartNumberMarker><MaxParts>{max}</MaxParts><IsTruncated>{truncated}</IsTruncated>",
            session.host, session.key, call.params["uploadId"]
        );
        for (number, data) in page {
            xml.push_str(&format!(
                "<Part><PartNumber>{number}</PartNumber><LastModified>2026-01-01T00:00:00.000Z</LastModified><ETag>\"{}\"</ETag><Size>{}</Size></Part>",
                md5_hex(data),
                data.len()
            ));
        }
        xml.push_str("</ListPartsResult>");
        xml_ok(xml)
    }

    fn list_uploads(&self, call: &Call) -> CosResponse {
        let prefix = call.params.get("prefix").cloned().unwrap_or_default();
        let key_marker = call.params.get("key-marker").cloned().unwrap_or_default();
        let id_marker = call.params.get("upload-id-marker").cloned().unwrap_or_default();

        let mut matching: Vec<(&String, &Session)> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.host == call.host && s.key.starts_with(&prefix))
            .filter(|(id, s)| (s.key.as_str(), id.as_str()) > (key_marker.as_str(), id_marker.as_str()))
            .collect();
        matching.sort_by(|a, b| (&a.1.key, a.0).cmp(&(&b.1.key, b.0)));

        let page = &matching[..matching.len().min(self.upload_page_size)];
        let truncated = matching.len() > page.len();
        let (next_key, next_id) = page
            .last()
            .map(|(id, s)| (s.key.clone(), id.to_string()))
            .unwrap_or_default();

        let mut xml = format!(
            "<ListMultipartUploadsResult><Bucket>{}</Bucket><Prefix>{prefix}</Prefix><KeyMarker>{key_marker}</KeyMarker><UploadIdMarker>{id_marker}</UploadIdMarker><NextKeyMarker>{next_key}</NextKeyMarker><NextUploadIdMarker>{next_id}</NextUploadIdMarker><IsTruncated>{truncated}</IsTruncated>",
            call.host
        );
        for (id, session) in page {
            xml.push_str(&format!(
                "<Upload><Key>{}</Key><UploadId>{id}</UploadId><StorageClass>STANDARD</StorageClass><Initiated>2026-01-01T00:{:02}:{:02}.000Z</Initiated></Upload>",
                session.key,
                session.sequence / 60,
                session.sequence % 60
            ));
        }
        xml.push_str("</ListMultipartUploadsResult>");
        xml_ok(xml)
    }
}

/// `(host, path)` of `scheme://host/path`, with the backup domain folded
/// back onto the default one.
fn split_url(url: &str) -> (String, String) {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (host, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let host = match host.strip_suffix(".tencentcos.cn") {
        Some(stem) => format!("{stem}.myqcloud.com"),
        None => host.to_string(),
    };
    (host, path.to_string())
}

fn decode_key(path: &str) -> String {
    let encoded = path.strip_prefix('/').unwrap_or(path);
    urlencoding::decode(encoded).unwrap().into_owned()
}

fn body_bytes(body: &RequestBody) -> Bytes {
    match body {
        RequestBody::Empty => Bytes::new(),
        RequestBody::Bytes(bytes) => bytes.clone(),
        RequestBody::File { path, offset, length } => {
            let data = std::fs::read(path).unwrap();
            Bytes::copy_from_slice(&data[*offset as usize..(*offset + *length) as usize])
        }
    }
}

/// Inclusive `(first, last)` of a `bytes=first-last` header.
fn parse_range(header: &str) -> Option<(u64, u64)> {
    let (first, last) = header.strip_prefix("bytes=")?.split_once('-')?;
    Some((first.parse().ok()?, last.parse().ok()?))
}

fn ranged_get(data: &Bytes, range: Option<&str>) -> CosResponse {
    let Some((first, last)) = range.and_then(parse_range) else {
        let mut response = object_headers(200, data);
        response.body = data.clone();
        return response;
    };
    let last = last.min(data.len() as u64 - 1);
    let slice = data.slice(first as usize..=last as usize);
    let mut response = object_headers(206, &slice);
    response.headers.insert("content-range".into(), format!("bytes {first}-{last}/{}", data.len()));
    response.body = slice;
    response
}

fn object_headers(status: u16, data: &[u8]) -> CosResponse {
    let mut headers = BTreeMap::new();
    headers.insert("content-length".to_string(), data.len().to_string());
    headers.insert("etag".to_string(), format!("\"{}\"", md5_hex(data)));
    headers.insert(HEADER_CRC64.to_string(), crc64(data));
    CosResponse { status, headers, body: Bytes::new() }
}

fn xml_ok(xml: String) -> CosResponse {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/xml".to_string());
    CosResponse { status: 200, headers, body: Bytes::from(xml) }
}

fn error(status: u16, code: &str, request_id: Option<&str>) -> CosResponse {
    let mut headers = BTreeMap::new();
    if let Some(id) = request_id {
        headers.insert(HEADER_REQUEST_ID.to_string(), id.to_string());
    }
    let body = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{code}</Code><Message>mock {code}</Message></Error>");
    CosResponse { status, headers, body: Bytes::from(body) }
}
