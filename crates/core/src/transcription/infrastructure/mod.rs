pub mod openai_http;
pub mod openai_speech_to_text;
pub mod openai_text_refiner;
