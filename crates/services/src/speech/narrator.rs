use std::sync::Arc;

use super::{AudioClip, AudioPlayer, SpeechSynthesizer};
use crate::error::SpeechError;

/// Speaks text for one screen or command.
///
/// The narrator owns its player; dropping it stops whatever it started, so
/// audio never outlives the component that asked for it.
pub struct Narrator<P: AudioPlayer> {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: P,
}

impl<P: AudioPlayer> Narrator<P> {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, player: P) -> Self {
        Self {
            synthesizer,
            player,
        }
    }

    /// Synthesize `text` and play it, replacing any current playback.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if synthesis or playback fails.
    pub async fn say(&self, text: &str) -> Result<AudioClip, SpeechError> {
        let clip = self.synthesizer.synthesize(text).await?;
        self.player.stop();
        self.player.play(&clip)?;
        Ok(clip)
    }

    pub fn stop(&self) {
        self.player.stop();
    }
}

impl<P: AudioPlayer> Drop for Narrator<P> {
    fn drop(&mut self) {
        self.player.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoSynth;

    #[async_trait]
    impl SpeechSynthesizer for EchoSynth {
        async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError> {
            if text.is_empty() {
                return Err(SpeechError::EmptyText);
            }
            Ok(AudioClip::new(text.as_bytes().to_vec(), "text/plain"))
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl AudioPlayer for Recorder {
        fn play(&self, clip: &AudioClip) -> Result<(), SpeechError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("play:{}", String::from_utf8_lossy(&clip.bytes)));
            Ok(())
        }

        fn stop(&self) {
            self.events.lock().unwrap().push("stop".into());
        }
    }

    #[tokio::test]
    async fn say_replaces_playback_and_drop_stops_it() {
        let recorder = Recorder::default();
        let events = Arc::clone(&recorder.events);
        {
            let narrator = Narrator::new(Arc::new(EchoSynth), recorder);
            narrator.say("你好").await.unwrap();
            narrator.say("谢谢").await.unwrap();
        }
        assert_eq!(
            *events.lock().unwrap(),
            vec!["stop", "play:你好", "stop", "play:谢谢", "stop"]
        );
    }

    #[tokio::test]
    async fn failed_synthesis_leaves_playback_alone() {
        let recorder = Recorder::default();
        let events = Arc::clone(&recorder.events);
        let narrator = Narrator::new(Arc::new(EchoSynth), recorder);
        assert!(narrator.say("").await.is_err());
        assert!(events.lock().unwrap().is_empty());
    }
}
