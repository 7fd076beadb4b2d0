use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    WebM,
    Matroska,
}

impl Container {
    /// ffmpeg muxer name.
    pub fn muxer(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Matroska => "matroska",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Matroska => "mkv",
        }
    }
}

/// A container/codec combination the capture device may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaFormat {
    pub container: Container,
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
    pub mime_type: &'static str,
    /// Encoder options passed after `-c:v`.
    #[serde(skip)]
    pub video_args: &'static [&'static str],
    /// Muxer options for streamed (pipe) output.
    #[serde(skip)]
    pub stream_args: &'static [&'static str],
}

/// Most broadly playable first, narrower fallbacks after.
pub const PREFERRED_FORMATS: [MediaFormat; 5] = [
    MediaFormat {
        container: Container::Mp4,
        video_codec: "libx264",
        audio_codec: "aac",
        mime_type: "video/mp4;codecs=avc1,mp4a",
        video_args: &["-preset", "veryfast", "-tune", "stillimage", "-pix_fmt", "yuv420p"],
        stream_args: &["-movflags", "frag_keyframe+empty_moov+default_base_moof"],
    },
    MediaFormat {
        container: Container::WebM,
        video_codec: "libvpx-vp9",
        audio_codec: "libopus",
        mime_type: "video/webm;codecs=vp9,opus",
        video_args: &["-deadline", "realtime", "-cpu-used", "8", "-b:v", "1M", "-pix_fmt", "yuv420p"],
        stream_args: &[],
    },
    MediaFormat {
        container: Container::WebM,
        video_codec: "libvpx",
        audio_codec: "libopus",
        mime_type: "video/webm;codecs=vp8,opus",
        video_args: &["-deadline", "realtime", "-b:v", "1M"],
        stream_args: &[],
    },
    MediaFormat {
        container: Container::WebM,
        video_codec: "libvpx",
        audio_codec: "libvorbis",
        mime_type: "video/webm;codecs=vp8,vorbis",
        video_args: &["-deadline", "realtime", "-b:v", "1M"],
        stream_args: &[],
    },
    MediaFormat {
        container: Container::Matroska,
        video_codec: "mjpeg",
        audio_codec: "pcm_s16le",
        mime_type: "video/x-matroska",
        video_args: &["-q:v", "5"],
        stream_args: &[],
    },
];

impl MediaFormat {
    pub fn preference_list() -> &'static [MediaFormat] {
        &PREFERRED_FORMATS
    }

    /// First format in preference order accepted by `supported`.
    pub fn select(supported: impl Fn(&MediaFormat) -> bool) -> Option<MediaFormat> {
        PREFERRED_FORMATS.iter().copied().find(|format| supported(format))
    }

    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }

    /// Streamed output never carries the final duration: Matroska-family
    /// muxers cannot seek back to fill it in, and fragmented MP4 starts with
    /// an empty `moov`. Either way the finished file needs a remux.
    pub fn needs_duration_fix(&self) -> bool {
        match self.container {
            Container::WebM | Container::Matroska => true,
            Container::Mp4 => self.stream_args.iter().any(|arg| arg.contains("empty_moov")),
        }
    }
}
